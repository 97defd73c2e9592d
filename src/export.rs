use crate::context::RunContext;
use crate::model::ReceiptRecord;
use crate::render::{tsv_string, visible};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// The files written by one export.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ExportFiles {
    json: PathBuf,
    tsv: PathBuf,
    records: usize,
}

impl ExportFiles {
    pub fn json(&self) -> &Path {
        &self.json
    }

    pub fn tsv(&self) -> &Path {
        &self.tsv
    }

    /// The number of records written.
    pub fn records(&self) -> usize {
        self.records
    }
}

/// How many names are tried for one stamp before giving up.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Writes `receipts-{stamp}.json` with the full records and `receipts-{stamp}.tsv` with the
/// table rows into `dir`. Excluded records are left out of both files. Both names share the
/// run's start time. Existing files are never replaced: when a name is taken, a counter is
/// added, e.g. `receipts-{stamp}-2.json`.
pub async fn export<'a, I>(records: I, dir: &Path, ctx: &RunContext) -> Result<ExportFiles>
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    let records: Vec<&ReceiptRecord> = visible(records).collect();
    utils::make_dir(dir).await?;

    let data = serde_json::to_string_pretty(&records).context("Unable to serialize receipts")?;
    let rows = tsv_string(records.iter().copied())?;

    let stamp = ctx.file_stamp();
    for n in 1..=MAX_NAME_ATTEMPTS {
        let base = if n == 1 {
            format!("receipts-{stamp}")
        } else {
            format!("receipts-{stamp}-{n}")
        };
        let json = dir.join(format!("{base}.json"));
        let tsv = dir.join(format!("{base}.tsv"));
        if tsv.exists() || !utils::write_new(&json, &data).await? {
            continue;
        }
        if !utils::write_new(&tsv, &rows).await? {
            utils::remove(&json).await?;
            continue;
        }

        info!(
            "Exported {} receipt(s) to {} and {}",
            records.len(),
            json.display(),
            tsv.display()
        );
        return Ok(ExportFiles {
            json,
            tsv,
            records: records.len(),
        });
    }
    bail!(
        "Unable to find an unused export file name for receipts-{stamp} in {}",
        dir.display()
    )
}
