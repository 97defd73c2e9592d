use crate::api::Extractor;
use crate::context::RunContext;
use crate::ledger::retry::{extract_with_date_retry, search_for_date, Attempted};
use crate::ledger::Ledger;
use crate::model::{ContentHash, ImageInput, ReceiptRecord};
use crate::Result;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How a batch is ingested.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestOptions {
    force: bool,
    retry_undated: bool,
    date_attempts: u32,
}

impl IngestOptions {
    /// - `force`: extract every image again, replacing stored records.
    /// - `retry_undated`: look again for the date of stored records that have none.
    /// - `date_attempts`: total extractor calls per image while the date is missing.
    pub fn new(force: bool, retry_undated: bool, date_attempts: u32) -> Self {
        Self {
            force,
            retry_undated,
            date_attempts: date_attempts.max(1),
        }
    }
}

/// Something about one input file that the user should know.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// The extractor declined the image.
    Rejected { file: String, reason: String },
    /// The extractor could not be reached or answered nonsense.
    Failed { file: String, error: String },
    /// Stored without a date after every attempt.
    Undated { file: String, attempts: u32 },
    /// The file has the same bytes as an earlier file of the batch.
    Duplicate { file: String, original: String },
    /// Stored, but kept out of tables and the sheet.
    Excluded {
        file: String,
        vendor: String,
        reason: Option<String>,
    },
    /// A stored record that had no date got one.
    Backfilled { file: String, date: NaiveDate },
}

impl Notice {
    fn log(&self) {
        match self {
            Notice::Rejected { file, reason } => warn!("Skipped {file}: {reason}"),
            Notice::Failed { file, error } => warn!("Failed to extract {file}: {error}"),
            Notice::Undated { file, attempts } => warn!(
                "No date found for {file} after {attempts} attempt(s), it will not be published"
            ),
            Notice::Duplicate { file, original } => {
                info!("{file} is the same image as {original}, skipping")
            }
            Notice::Excluded {
                file,
                vendor,
                reason,
            } => info!(
                "{file} ({vendor}) is excluded from the table: {}",
                reason.as_deref().unwrap_or("no reason given")
            ),
            Notice::Backfilled { file, date } => info!("Found the date of {file}: {date}"),
        }
    }
}

/// The outcome of one ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// One record per distinct image of the batch, in input order, whether it was extracted in
    /// this run or already stored.
    records: Vec<ReceiptRecord>,
    /// Records extracted by this run.
    extracted: usize,
    /// Inputs whose stored record was reused.
    reused: usize,
    /// Calls made to the extractor, retries included.
    extractor_calls: u32,
    notices: Vec<Notice>,
}

impl IngestReport {
    pub fn records(&self) -> &[ReceiptRecord] {
        &self.records
    }

    pub fn extracted(&self) -> usize {
        self.extracted
    }

    pub fn reused(&self) -> usize {
        self.reused
    }

    pub fn extractor_calls(&self) -> u32 {
        self.extractor_calls
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Reports a file that could not be read before ingestion.
    pub fn unreadable(&mut self, file: &str, error: &str) {
        self.notice(Notice::Failed {
            file: file.to_string(),
            error: error.to_string(),
        });
    }

    fn notice(&mut self, notice: Notice) {
        notice.log();
        self.notices.push(notice);
    }

    fn excluded(&mut self, file: &str, record: &ReceiptRecord) {
        if record.exclude_from_table() {
            self.notice(Notice::Excluded {
                file: file.to_string(),
                vendor: record.vendor().to_string(),
                reason: record.exclusion_reason().map(str::to_string),
            });
        }
    }
}

/// Reconciles `inputs` with `ledger`.
///
/// An image whose content hash is stored is not extracted again unless `force` is set, and an
/// image whose bytes appeared earlier in the batch is never extracted twice. Each new record is
/// saved to the ledger before the next image is looked at. Rejections and extractor failures
/// are reported per file and do not stop the batch; a failure to save the ledger does.
pub async fn ingest(
    ledger: &mut Ledger,
    extractor: &mut (dyn Extractor + Send),
    inputs: &[ImageInput],
    options: IngestOptions,
    ctx: &RunContext,
) -> Result<IngestReport> {
    info!("Ingesting {} image(s), run {}", inputs.len(), ctx.run_id());
    let mut report = IngestReport::default();
    let mut seen: HashMap<&ContentHash, &str> = HashMap::new();

    for image in inputs {
        let hash = image.hash();
        if let Some(original) = seen.get(hash) {
            report.notice(Notice::Duplicate {
                file: image.file_name().to_string(),
                original: original.to_string(),
            });
            continue;
        }
        seen.insert(hash, image.file_name());

        let existing = ledger.get(hash).cloned();
        match existing {
            Some(stored) if !options.force => {
                debug!("{} is already processed ({})", image.file_name(), hash.short());
                report.reused += 1;
                let stored = if options.retry_undated && stored.date().is_none() {
                    backfill(ledger, extractor, image, options, ctx, &mut report).await?
                } else {
                    stored
                };
                report.excluded(image.file_name(), &stored);
                report.records.push(stored);
            }
            previous => {
                info!("Extracting {}", image.file_name());
                let outcome = extract_with_date_retry(
                    extractor,
                    image,
                    options.date_attempts,
                    ctx.today(),
                )
                .await;
                match outcome {
                    Err(e) => {
                        report.extractor_calls += 1;
                        report.notice(Notice::Failed {
                            file: image.file_name().to_string(),
                            error: format!("{e:#}"),
                        });
                    }
                    Ok(Attempted::Rejected(rejection)) => {
                        report.extractor_calls += 1;
                        report.notice(Notice::Rejected {
                            file: image.file_name().to_string(),
                            reason: rejection.reason().to_string(),
                        });
                    }
                    Ok(Attempted::Receipt { receipt, attempts }) => {
                        report.extractor_calls += attempts;
                        let record = match &previous {
                            Some(old) => ReceiptRecord::with_id(
                                old.id(),
                                hash.clone(),
                                image.file_name(),
                                receipt,
                            ),
                            None => ReceiptRecord::new(hash.clone(), image.file_name(), receipt),
                        };
                        if record.date().is_none() {
                            report.notice(Notice::Undated {
                                file: image.file_name().to_string(),
                                attempts,
                            });
                        }
                        report.excluded(image.file_name(), &record);
                        ledger.upsert(record.clone(), ctx.started().with_timezone(&Utc));
                        ledger.save().await?;
                        report.extracted += 1;
                        report.records.push(record);
                    }
                }
            }
        }
    }

    ledger.save().await?;
    info!(
        "Extracted {} new receipt(s), reused {} stored receipt(s), {} notice(s)",
        report.extracted,
        report.reused,
        report.notices.len()
    );
    Ok(report)
}

/// Runs the date search for a stored record without a date and saves the date if one is found.
async fn backfill(
    ledger: &mut Ledger,
    extractor: &mut (dyn Extractor + Send),
    image: &ImageInput,
    options: IngestOptions,
    ctx: &RunContext,
    report: &mut IngestReport,
) -> Result<ReceiptRecord> {
    let hash = image.hash();
    let search = search_for_date(extractor, image, options.date_attempts, ctx.today()).await;
    report.extractor_calls += search.calls;
    if let Some(date) = search.found.and_then(|r| r.date) {
        ledger.backfill_date(hash, date)?;
        ledger.save().await?;
        report.notice(Notice::Backfilled {
            file: image.file_name().to_string(),
            date,
        });
    } else {
        report.notice(Notice::Undated {
            file: image.file_name().to_string(),
            attempts: search.calls,
        });
    }
    ledger
        .get(hash)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Receipt {} vanished from the ledger", hash.short()))
}
