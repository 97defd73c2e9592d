//! Publishes receipt records to a spreadsheet with one tab per month, without ever adding a row
//! whose `(date, amount, vendor)` is already in the tab.

use crate::api::{Publisher, SheetHandle};
use crate::context::RunContext;
use crate::model::{Amount, Period, PublicationKey, ReceiptRecord, SheetColumns};
use crate::render::{header_row, sheet_row};
use crate::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// How records are published.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct PublishOptions {
    include_excluded: bool,
    dry_run: bool,
}

impl PublishOptions {
    /// - `include_excluded`: publish records marked as excluded from the table.
    /// - `dry_run`: read the sheet and report, but neither create tabs nor append rows.
    pub fn new(include_excluded: bool, dry_run: bool) -> Self {
        Self {
            include_excluded,
            dry_run,
        }
    }
}

/// A record as it relates to one sheet tab.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RowRef {
    sheet: String,
    file: String,
    date: NaiveDate,
    amount: Amount,
    vendor: String,
}

impl RowRef {
    fn new(sheet: &str, record: &ReceiptRecord, date: NaiveDate) -> Self {
        Self {
            sheet: sheet.to_string(),
            file: record.source_file().to_string(),
            date,
            amount: record.amount(),
            vendor: record.vendor().to_string(),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn file(&self) -> &str {
        &self.file
    }
}

/// A record that was left out because it is excluded from the table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SkippedExcluded {
    file: String,
    vendor: String,
    reason: Option<String>,
}

/// Why publishing stopped early.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublishFailure {
    error: String,
    /// Source files of the records that were not published.
    unpublished: Vec<String>,
}

impl PublishFailure {
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn unpublished(&self) -> &[String] {
        &self.unpublished
    }
}

/// What publishing did, or in a dry run, would do.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    dry_run: bool,
    /// Tabs created by this run (or that a dry run would create).
    created_sheets: Vec<String>,
    /// Rows appended (or that a dry run would append).
    appended: Vec<RowRef>,
    /// Records whose key was already in the sheet before this run.
    already_present: Vec<RowRef>,
    /// Records whose key matched an earlier record of this run.
    duplicates: Vec<RowRef>,
    /// Source files of records without a date.
    undated: Vec<String>,
    excluded: Vec<SkippedExcluded>,
    failure: Option<PublishFailure>,
}

impl PublishReport {
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn created_sheets(&self) -> &[String] {
        &self.created_sheets
    }

    pub fn appended(&self) -> &[RowRef] {
        &self.appended
    }

    pub fn already_present(&self) -> &[RowRef] {
        &self.already_present
    }

    pub fn duplicates(&self) -> &[RowRef] {
        &self.duplicates
    }

    pub fn undated(&self) -> &[String] {
        &self.undated
    }

    pub fn excluded(&self) -> &[SkippedExcluded] {
        &self.excluded
    }

    pub fn failure(&self) -> Option<&PublishFailure> {
        self.failure.as_ref()
    }

    /// A one-line summary for the user.
    pub fn summary(&self) -> String {
        let verb = if self.dry_run {
            "Would publish"
        } else {
            "Published"
        };
        let mut s = format!(
            "{verb} {} row(s); {} already in the sheet, {} duplicate(s) in this batch, {} \
            without a date, {} excluded",
            self.appended.len(),
            self.already_present.len(),
            self.duplicates.len(),
            self.undated.len(),
            self.excluded.len(),
        );
        if let Some(failure) = &self.failure {
            s.push_str(&format!(
                "; stopped with {} record(s) unpublished: {}",
                failure.unpublished.len(),
                failure.error
            ));
        }
        s
    }
}

/// Publishes `records`, in order, to one tab per month.
///
/// Excluded records (unless `include_excluded`) and records without a date are reported and
/// skipped. The remaining records are grouped by month and the months are visited in calendar
/// order. Each tab is read once and reduced to the set of publication keys it holds; a record is
/// appended only when its key is in neither that set nor among the records already handled by
/// this call.
///
/// A publisher error stops the run. Rows appended before the error stay in the sheet and every
/// record not yet handled is listed in the report's `failure`, so running again appends exactly
/// the missing rows.
pub async fn publish<'a, I>(
    publisher: &mut (dyn Publisher + Send),
    records: I,
    options: PublishOptions,
    ctx: &RunContext,
) -> PublishReport
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    let mut report = PublishReport {
        dry_run: options.dry_run,
        ..PublishReport::default()
    };

    let mut periods: BTreeMap<Period, Vec<(&ReceiptRecord, NaiveDate)>> = BTreeMap::new();
    for record in records {
        if record.exclude_from_table() && !options.include_excluded {
            info!(
                "Not publishing {} ({}): excluded, {}",
                record.source_file(),
                record.vendor(),
                record.exclusion_reason().unwrap_or("no reason given")
            );
            report.excluded.push(SkippedExcluded {
                file: record.source_file().to_string(),
                vendor: record.vendor().to_string(),
                reason: record.exclusion_reason().map(str::to_string),
            });
            continue;
        }
        let Some(date) = record.date() else {
            warn!(
                "Not publishing {} ({}): it has no date",
                record.source_file(),
                record.vendor()
            );
            report.undated.push(record.source_file().to_string());
            continue;
        };
        periods
            .entry(Period::of(date))
            .or_default()
            .push((record, date));
    }

    debug!(
        "Publishing run {} to {} tab(s)",
        ctx.run_id(),
        periods.len()
    );

    let mut seen: HashSet<PublicationKey> = HashSet::new();
    let groups: Vec<(Period, Vec<(&ReceiptRecord, NaiveDate)>)> = periods.into_iter().collect();
    for (group_ix, (period, group)) in groups.iter().enumerate() {
        let title = period.label();
        let mut done = 0;
        let result = publish_period(
            publisher,
            &title,
            group,
            options,
            &mut seen,
            &mut report,
            &mut done,
        )
        .await;
        if let Err(e) = result {
            let error = format!("{e:#}");
            warn!("Publishing to '{title}' failed: {error}");
            let unpublished = group[done..]
                .iter()
                .chain(groups[group_ix + 1..].iter().flat_map(|(_, g)| g.iter()))
                .map(|(r, _)| r.source_file().to_string())
                .collect();
            report.failure = Some(PublishFailure { error, unpublished });
            break;
        }
    }

    info!("{}", report.summary());
    report
}

/// Publishes one month. `done` counts the records of `group` that have been handled, so that on
/// error the caller knows which were not.
async fn publish_period(
    publisher: &mut (dyn Publisher + Send),
    title: &str,
    group: &[(&ReceiptRecord, NaiveDate)],
    options: PublishOptions,
    seen: &mut HashSet<PublicationKey>,
    report: &mut PublishReport,
    done: &mut usize,
) -> Result<()> {
    let sheet = if options.dry_run {
        let found = publisher.find_sheet(title).await?;
        if found.is_none() {
            report.created_sheets.push(title.to_string());
        }
        found
    } else {
        let sheet = publisher.find_or_create_sheet(title).await?;
        if sheet.created() {
            info!("Created sheet '{title}'");
            report.created_sheets.push(title.to_string());
            publisher.append_row(&sheet, &header_row()).await?;
        }
        Some(sheet)
    };

    let existing = match &sheet {
        Some(sheet) => existing_keys(publisher, sheet).await?,
        None => HashSet::new(),
    };
    debug!("'{title}' holds {} receipt row(s)", existing.len());

    for (record, date) in group {
        let key = PublicationKey::new(*date, record.amount(), record.vendor());
        let row = RowRef::new(title, record, *date);
        if seen.contains(&key) {
            info!(
                "{} duplicates an earlier receipt of this batch ({} {} {})",
                record.source_file(),
                date,
                record.amount(),
                record.vendor()
            );
            report.duplicates.push(row);
        } else if existing.contains(&key) {
            debug!("{} is already in '{title}'", record.source_file());
            seen.insert(key);
            report.already_present.push(row);
        } else {
            if let Some(sheet) = &sheet {
                if !options.dry_run {
                    publisher.append_row(sheet, &sheet_row(record)).await?;
                }
            }
            seen.insert(key);
            report.appended.push(row);
        }
        *done += 1;
    }
    Ok(())
}

/// Reads a tab and collects the publication keys of its rows. Columns are located through the
/// header row when there is one.
async fn existing_keys(
    publisher: &mut (dyn Publisher + Send),
    sheet: &SheetHandle,
) -> Result<HashSet<PublicationKey>> {
    let rows = publisher.read_rows(sheet).await?;
    let columns = rows
        .first()
        .and_then(|h| SheetColumns::from_header(h))
        .unwrap_or_default();
    Ok(rows
        .iter()
        .filter_map(|row| PublicationKey::from_row(row, &columns))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestSheet;
    use crate::test::record;

    fn ctx() -> RunContext {
        RunContext::new()
    }

    const HEADER_TSV: &str = "Amount\tDate\t\tVendor\tCategory\n";

    #[tokio::test]
    async fn test_one_tab_per_month_in_calendar_order() {
        let feb = record("feb.jpg", "40", Some((2026, 2, 1)), "Corner Grocery");
        let jan = record("jan.jpg", "12.5", Some((2026, 1, 5)), "Cafe X");
        let jan2 = record("jan2.jpg", "3", Some((2026, 1, 20)), "Kiosk");
        let mut sheet = TestSheet::default();

        let report = publish(
            &mut sheet,
            [&feb, &jan, &jan2],
            PublishOptions::default(),
            &ctx(),
        )
        .await;

        assert!(report.failure().is_none());
        assert_eq!(sheet.requested(), ["January 2026", "February 2026"]);
        assert_eq!(report.created_sheets(), ["January 2026", "February 2026"]);
        let january = sheet.rows("January 2026").unwrap();
        assert_eq!(january.len(), 3);
        assert_eq!(january[0], header_row());
        assert_eq!(
            january[1],
            ["12.50", "1/5/2026", "", "Cafe X", "Food & Restaurants"]
        );
        assert_eq!(january[2][3], "Kiosk");
        let february = sheet.rows("February 2026").unwrap();
        assert_eq!(february.len(), 2);
        assert_eq!(february[1][3], "Corner Grocery");
    }

    #[tokio::test]
    async fn test_duplicate_in_batch_publishes_once() {
        // Two photos of the same receipt: different hashes, same key.
        let a = record("photo1.jpg", "12.5", Some((2026, 1, 5)), "Cafe X");
        let b = record("photo2.jpg", "12.50", Some((2026, 1, 5)), "cafe x ");
        let mut sheet = TestSheet::default();

        let report = publish(&mut sheet, [&a, &b], PublishOptions::default(), &ctx()).await;

        assert_eq!(report.appended().len(), 1);
        assert_eq!(report.appended()[0].file(), "photo1.jpg");
        assert_eq!(report.duplicates().len(), 1);
        assert_eq!(report.duplicates()[0].file(), "photo2.jpg");
        assert_eq!(sheet.rows("January 2026").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_key_already_in_sheet_is_not_appended() {
        let a = record("a.jpg", "12.5", Some((2026, 1, 5)), "Cafe X");
        let b = record("b.jpg", "7", Some((2026, 1, 6)), "Bakery");
        let tsv = format!("{HEADER_TSV}$12.50\t01/05/2026\t\tCAFE X\tFood & Restaurants\n");
        let mut sheet = TestSheet::default()
            .with_tsv("January 2026", &tsv)
            .unwrap();

        let report = publish(&mut sheet, [&a, &b], PublishOptions::default(), &ctx()).await;

        assert!(report.created_sheets().is_empty());
        assert_eq!(report.already_present().len(), 1);
        assert_eq!(report.appended().len(), 1);
        let rows = sheet.rows("January 2026").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2][3], "Bakery");

        // Running again is a no-op.
        let again = publish(&mut sheet, [&a, &b], PublishOptions::default(), &ctx()).await;
        assert!(again.appended().is_empty());
        assert_eq!(again.already_present().len(), 2);
        assert_eq!(sheet.rows("January 2026").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_formula_like_vendor_is_stored_as_text() {
        let a = record("a.jpg", "5", Some((2026, 1, 8)), "=SUM(1,2)");
        let mut sheet = TestSheet::default();

        let report = publish(&mut sheet, [&a], PublishOptions::default(), &ctx()).await;
        assert_eq!(report.appended().len(), 1);
        assert_eq!(sheet.rows("January 2026").unwrap()[1][3], "=SUM(1,2)");

        let again = publish(&mut sheet, [&a], PublishOptions::default(), &ctx()).await;
        assert!(again.appended().is_empty());
        assert_eq!(again.already_present().len(), 1);
        assert_eq!(sheet.appended(), 2);
    }

    #[tokio::test]
    async fn test_existing_sheet_with_other_column_order() {
        let a = record("a.jpg", "12.5", Some((2026, 1, 5)), "Cafe X");
        let tsv = "Vendor\tNotes\tDate\tAmount\nCafe X\t\t1/5/2026\t12.5\n";
        let mut sheet = TestSheet::default().with_tsv("January 2026", tsv).unwrap();
        let report = publish(&mut sheet, [&a], PublishOptions::default(), &ctx()).await;
        assert_eq!(report.already_present().len(), 1);
        assert_eq!(sheet.appended(), 0);
    }

    #[tokio::test]
    async fn test_excluded_and_undated_records_are_skipped() {
        let mut excluded = record("pay.jpg", "1000", Some((2026, 1, 15)), "Employer");
        excluded.set_excluded(true, Some("Paystub".to_string()));
        let undated = record("u.jpg", "4", None, "Kiosk");
        let mut sheet = TestSheet::default();

        let report = publish(
            &mut sheet,
            [&excluded, &undated],
            PublishOptions::default(),
            &ctx(),
        )
        .await;
        assert!(report.appended().is_empty());
        assert_eq!(report.undated(), ["u.jpg"]);
        assert_eq!(report.excluded().len(), 1);
        assert!(sheet.requested().is_empty());

        let report = publish(
            &mut sheet,
            [&excluded, &undated],
            PublishOptions::new(true, false),
            &ctx(),
        )
        .await;
        assert_eq!(report.appended().len(), 1);
        assert!(report.excluded().is_empty());
        assert_eq!(sheet.rows("January 2026").unwrap()[1][3], "Employer");
    }

    #[tokio::test]
    async fn test_failure_stops_and_rerun_completes() {
        let a = record("a.jpg", "1", Some((2026, 1, 1)), "A");
        let b = record("b.jpg", "2", Some((2026, 1, 2)), "B");
        let c = record("c.jpg", "3", Some((2026, 2, 3)), "C");
        // The header takes the first append.
        let mut sheet = TestSheet {
            fail_after_appends: Some(2),
            ..TestSheet::default()
        };

        let report = publish(&mut sheet, [&a, &b, &c], PublishOptions::default(), &ctx()).await;
        let failure = report.failure().unwrap();
        assert!(failure.error().contains("refused"));
        assert_eq!(failure.unpublished(), ["b.jpg", "c.jpg"]);
        assert_eq!(report.appended().len(), 1);
        assert_eq!(sheet.requested(), ["January 2026"]);

        sheet.fail_after_appends = None;
        let report = publish(&mut sheet, [&a, &b, &c], PublishOptions::default(), &ctx()).await;
        assert!(report.failure().is_none());
        assert_eq!(report.already_present().len(), 1);
        assert_eq!(report.appended().len(), 2);
        assert_eq!(sheet.rows("January 2026").unwrap().len(), 3);
        assert_eq!(sheet.rows("February 2026").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_publisher() {
        let a = record("a.jpg", "1", Some((2026, 1, 1)), "A");
        let mut sheet = TestSheet {
            unreachable: true,
            ..TestSheet::default()
        };
        let report = publish(&mut sheet, [&a], PublishOptions::default(), &ctx()).await;
        assert_eq!(report.failure().unwrap().unpublished(), ["a.jpg"]);
        assert!(report.appended().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let a = record("a.jpg", "12.5", Some((2026, 1, 5)), "Cafe X");
        let b = record("b.jpg", "9", Some((2026, 2, 5)), "Diner");
        let tsv = format!("{HEADER_TSV}12.50\t1/5/2026\t\tCafe X\tFood & Restaurants\n");
        let mut sheet = TestSheet::default()
            .with_tsv("January 2026", &tsv)
            .unwrap();

        let report = publish(&mut sheet, [&a, &b], PublishOptions::new(false, true), &ctx()).await;
        assert!(report.dry_run());
        assert_eq!(report.already_present().len(), 1);
        assert_eq!(report.appended().len(), 1);
        assert_eq!(report.created_sheets(), ["February 2026"]);
        assert!(sheet.rows("February 2026").is_none());
        assert_eq!(sheet.appended(), 0);
        assert!(report.summary().starts_with("Would publish 1 row(s)"));
    }
}
