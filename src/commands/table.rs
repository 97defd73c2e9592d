use crate::args::TableArgs;
use crate::commands::Out;
use crate::context::RunContext;
use crate::export::{export, ExportFiles};
use crate::ledger::Ledger;
use crate::model::ReceiptRecord;
use crate::render::{console_table, excluded_notes, visible};
use crate::{Config, Result};
use serde::Serialize;
use tracing::debug;

/// The receipts shown by `table`.
#[derive(Debug, Clone, Serialize)]
pub struct TableOutput {
    records: Vec<ReceiptRecord>,
    /// Records that matched but are excluded from tables.
    excluded: Vec<ReceiptRecord>,
    export: Option<ExportFiles>,
}

impl TableOutput {
    pub fn records(&self) -> &[ReceiptRecord] {
        &self.records
    }

    pub fn excluded(&self) -> &[ReceiptRecord] {
        &self.excluded
    }

    pub fn export(&self) -> Option<&ExportFiles> {
        self.export.as_ref()
    }
}

/// Prints the stored receipts that match the filters. Excluded ones are named below the table
/// instead of shown as rows.
pub async fn table(config: Config, args: TableArgs, ctx: RunContext) -> Result<Out<TableOutput>> {
    let ledger = Ledger::load(config.ledger_path()).await?;
    let filter = args.filter();
    let all = ledger.records();
    let matching: Vec<&ReceiptRecord> = filter.apply(all.iter().copied()).collect();
    let records: Vec<ReceiptRecord> = visible(matching.iter().copied()).cloned().collect();
    let excluded: Vec<ReceiptRecord> = matching
        .iter()
        .filter(|r| r.exclude_from_table())
        .map(|r| (*r).clone())
        .collect();
    for r in &records {
        debug!("{} {}", r.content_hash().short(), r.source_file());
    }

    let export = if args.export() {
        Some(export(&records, &config.output_dir(), &ctx).await?)
    } else {
        None
    };

    let mut message = format!("{} of {} stored receipt(s) shown", records.len(), ledger.len());
    if !excluded.is_empty() {
        let names: Vec<String> = excluded
            .iter()
            .map(|r| {
                format!(
                    "{}: {}",
                    r.vendor(),
                    r.exclusion_reason().unwrap_or("no reason given")
                )
            })
            .collect();
        message.push_str(&format!("; {} excluded ({})", excluded.len(), names.join(", ")));
    }
    if let Some(files) = &export {
        message.push_str(&format!("; exported to {}", files.tsv().display()));
    }
    let mut display = console_table(&records);
    display.push_str(&excluded_notes(&excluded));
    Ok(Out::new(
        message,
        TableOutput {
            records,
            excluded,
            export,
        },
    )
    .with_display(display))
}
