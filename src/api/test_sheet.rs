//! Implements the `Publisher` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the
//! whole app, top-to-bottom, without using Google Sheets.

use crate::api::{Publisher, SheetHandle};
use crate::Result;
use anyhow::{bail, Context};
use std::collections::BTreeMap;
use std::io::Cursor;

/// An implementation of the `Publisher` trait that does not use Google sheets. It holds tabs in
/// memory, records which tabs were requested, and can be told to fail.
#[derive(Debug, Default)]
pub struct TestSheet {
    /// Tab title -> rows.
    pub(crate) data: BTreeMap<String, Vec<Vec<String>>>,
    /// Every title passed to `find_or_create_sheet`, in call order.
    pub(crate) requested: Vec<String>,
    /// When set, `append_row` fails once this many rows have been appended.
    pub(crate) fail_after_appends: Option<usize>,
    /// When true, every call fails as if the service were unreachable.
    pub(crate) unreachable: bool,
    /// Rows appended so far.
    pub(crate) appended: usize,
}

impl TestSheet {
    /// Create a new `TestSheet` using `data`. The map key is the tab title and the map value is
    /// the rows of the tab.
    pub fn new(data: BTreeMap<String, Vec<Vec<String>>>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Adds a tab whose rows are given as tab-separated text.
    pub fn with_tsv(mut self, title: &str, tsv: &str) -> Result<Self> {
        self.data.insert(title.to_string(), load_tsv(tsv)?);
        Ok(self)
    }

    pub fn rows(&self, title: &str) -> Option<&Vec<Vec<String>>> {
        self.data.get(title)
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn appended(&self) -> usize {
        self.appended
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            bail!("The test sheet is unreachable");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Publisher for TestSheet {
    async fn find_sheet(&mut self, title: &str) -> Result<Option<SheetHandle>> {
        self.check_reachable()?;
        Ok(self
            .data
            .contains_key(title)
            .then(|| SheetHandle::new(title, None, false)))
    }

    async fn create_sheet(&mut self, title: &str) -> Result<SheetHandle> {
        self.check_reachable()?;
        if self.data.contains_key(title) {
            bail!("A sheet named '{title}' already exists");
        }
        self.data.insert(title.to_string(), Vec::new());
        Ok(SheetHandle::new(title, None, true))
    }

    async fn read_rows(&mut self, sheet: &SheetHandle) -> Result<Vec<Vec<String>>> {
        self.check_reachable()?;
        self.data
            .get(sheet.title())
            .with_context(|| format!("Sheet '{}' not found", sheet.title()))
            .cloned()
    }

    async fn append_row(&mut self, sheet: &SheetHandle, row: &[String]) -> Result<()> {
        self.check_reachable()?;
        if self.fail_after_appends.is_some_and(|n| self.appended >= n) {
            bail!("The test sheet refused the append (rate limited)");
        }
        let rows = self
            .data
            .get_mut(sheet.title())
            .with_context(|| format!("Sheet '{}' not found", sheet.title()))?;
        // Like a user-entered value, a leading quote marks literal text and is not stored.
        rows.push(
            row.iter()
                .map(|cell| cell.strip_prefix('\'').unwrap_or(cell.as_str()).to_string())
                .collect(),
        );
        self.appended += 1;
        Ok(())
    }

    async fn find_or_create_sheet(&mut self, title: &str) -> Result<SheetHandle> {
        self.requested.push(title.to_string());
        match self.find_sheet(title).await? {
            Some(handle) => Ok(handle),
            None => self.create_sheet(title).await,
        }
    }
}

/// Loads rows from a tab-separated string.
fn load_tsv(tsv: &str) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false) // Ensure headers are treated as part of the data
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(Cursor::new(tsv.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}
