use crate::model::{ContentHash, ReceiptRecord};
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const LEDGER_VERSION: u32 = 1;
const PROBE_SUFFIX: &str = "probe";

/// The on-disk shape of `ledger.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    receipts: BTreeMap<ContentHash, LedgerEntry>,
}

/// A stored record and when it was (last) extracted.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    record: ReceiptRecord,
    processed_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn record(&self) -> &ReceiptRecord {
        &self.record
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }
}

/// The local store. Each content hash maps to exactly one record, so a hash can never be marked
/// processed without its record.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<ContentHash, LedgerEntry>,
}

impl Ledger {
    /// Loads the store at `path`. A missing file is an empty store, an unreadable or corrupt one
    /// is an error.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No ledger at {}, starting empty", path.display());
            return Ok(Self {
                path,
                entries: BTreeMap::new(),
            });
        }
        let file: LedgerFile = utils::deserialize(&path)
            .await
            .context("The ledger file is unreadable or corrupt")?;
        ensure!(
            file.version == LEDGER_VERSION,
            "Unsupported ledger version {} in {}, expected {}",
            file.version,
            path.display(),
            LEDGER_VERSION
        );
        for (hash, entry) in &file.receipts {
            ensure!(
                entry.record.content_hash() == hash,
                "Ledger entry {} holds a record for {}",
                hash.short(),
                entry.record.content_hash().short()
            );
        }
        debug!(
            "Loaded {} receipts from {}",
            file.receipts.len(),
            path.display()
        );
        Ok(Self {
            path,
            entries: file.receipts,
        })
    }

    /// Loads the store and checks that its directory is writable, so that a run fails before
    /// spending any extraction calls.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let ledger = Self::load(path).await?;
        ledger.probe_writable().await?;
        Ok(ledger)
    }

    /// Writes and removes a scratch file next to the ledger.
    pub async fn probe_writable(&self) -> Result<()> {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(PROBE_SUFFIX);
        let probe = self.path.with_file_name(name);
        utils::write(&probe, b"")
            .await
            .context("The ledger directory is not writable")?;
        utils::remove(&probe).await
    }

    /// Rewrites the whole store with write-to-temporary-then-rename.
    pub async fn save(&self) -> Result<()> {
        let file = LedgerFile {
            version: LEDGER_VERSION,
            receipts: self.entries.clone(),
        };
        let data = serde_json::to_string_pretty(&file).context("Unable to serialize the ledger")?;
        utils::write_atomic(&self.path, data)
            .await
            .context("Unable to save the ledger")?;
        trace!("Saved {} receipts to {}", self.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn get(&self, hash: &ContentHash) -> Option<&ReceiptRecord> {
        self.entries.get(hash).map(LedgerEntry::record)
    }

    pub fn entry(&self, hash: &ContentHash) -> Option<&LedgerEntry> {
        self.entries.get(hash)
    }

    /// All records, in the order they were processed.
    pub fn records(&self) -> Vec<&ReceiptRecord> {
        let mut entries: Vec<&LedgerEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            a.processed_at
                .cmp(&b.processed_at)
                .then_with(|| a.record.source_file().cmp(b.record.source_file()))
        });
        entries.into_iter().map(LedgerEntry::record).collect()
    }

    /// Stores `record` under its content hash, replacing any previous record for the same bytes.
    pub(crate) fn upsert(&mut self, record: ReceiptRecord, processed_at: DateTime<Utc>) {
        self.entries.insert(
            record.content_hash().clone(),
            LedgerEntry {
                record,
                processed_at,
            },
        );
    }

    /// Resolves a unique hash prefix, as typed by a user, to a stored hash.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<ContentHash> {
        let prefix = prefix.trim().to_ascii_lowercase();
        ensure!(!prefix.is_empty(), "A hash prefix is required");
        let mut found = self
            .entries
            .keys()
            .filter(|h| h.as_str().starts_with(&prefix));
        let Some(first) = found.next() else {
            bail!("No receipt has a hash starting with '{prefix}'");
        };
        if found.next().is_some() {
            bail!("More than one receipt has a hash starting with '{prefix}', use a longer prefix");
        }
        Ok(first.clone())
    }

    /// Sets or clears the exclusion flag of a stored record.
    pub(crate) fn set_excluded(
        &mut self,
        hash: &ContentHash,
        excluded: bool,
        reason: Option<String>,
    ) -> Result<&ReceiptRecord> {
        let entry = self
            .entries
            .get_mut(hash)
            .with_context(|| format!("No receipt with hash {}", hash.short()))?;
        entry.record.set_excluded(excluded, reason);
        Ok(&entry.record)
    }

    /// Fills in the date of a stored record that has none.
    pub(crate) fn backfill_date(&mut self, hash: &ContentHash, date: NaiveDate) -> Result<()> {
        let entry = self
            .entries
            .get_mut(hash)
            .with_context(|| format!("No receipt with hash {}", hash.short()))?;
        ensure!(
            entry.record.date().is_none(),
            "Receipt {} already has a date",
            hash.short()
        );
        entry.record.backfill_date(date);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::record;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::open(dir.path().join("ledger.json")).await.unwrap();
        assert!(ledger.is_empty());
        // Probing leaves nothing behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = Ledger::load(&path).await.unwrap();
        let a = record("a.jpg", "12.50", Some((2026, 1, 5)), "Cafe X");
        let b = record("b.jpg", "3", None, "Kiosk");
        ledger.upsert(a.clone(), Utc::now());
        ledger.upsert(b.clone(), Utc::now());
        ledger.save().await.unwrap();
        assert!(!utils::tmp_path(&path).exists());

        let loaded = Ledger::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(a.content_hash()), Some(&a));
        assert_eq!(loaded.get(b.content_hash()), Some(&b));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        let entry = &json["receipts"][a.content_hash().as_str()];
        assert_eq!(entry["record"]["vendor"], "Cafe X");
        assert!(entry["processed_at"].is_string());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_hash() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json")).await.unwrap();
        let a = record("a.jpg", "12.50", Some((2026, 1, 5)), "Cafe X");
        ledger.upsert(a.clone(), Utc::now());
        ledger.upsert(a.clone(), Utc::now());
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Ledger::load(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("corrupt"));

        std::fs::write(&path, r#"{"version": 9, "receipts": {}}"#).unwrap();
        assert!(Ledger::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_unwritable_directory_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("ledger.json");
        assert!(Ledger::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_prefix_and_mutations() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json")).await.unwrap();
        let a = record("a.jpg", "12.50", None, "Cafe X");
        ledger.upsert(a.clone(), Utc::now());
        let hash = a.content_hash().clone();

        assert_eq!(ledger.find_by_prefix(&hash.short().to_uppercase()).unwrap(), hash);
        assert!(ledger.find_by_prefix("").is_err());
        assert!(ledger.find_by_prefix("zzzz").is_err());

        let updated = ledger
            .set_excluded(&hash, true, Some("personal".to_string()))
            .unwrap();
        assert!(updated.exclude_from_table());
        assert_eq!(updated.exclusion_reason(), Some("personal"));
        let updated = ledger.set_excluded(&hash, false, None).unwrap();
        assert!(!updated.exclude_from_table());
        assert_eq!(updated.exclusion_reason(), None);

        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        ledger.backfill_date(&hash, date).unwrap();
        assert_eq!(ledger.get(&hash).unwrap().date(), Some(date));
        assert!(ledger.backfill_date(&hash, date).is_err());
    }

    #[tokio::test]
    async fn test_ambiguous_prefix() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::load(dir.path().join("ledger.json")).await.unwrap();
        for i in 0..40 {
            ledger.upsert(record(&format!("{i}.jpg"), "1", None, "V"), Utc::now());
        }
        // 40 hashes over 16 leading digits: at least one digit is shared.
        let shared = (0..16)
            .map(|d| format!("{d:x}"))
            .find(|p| ledger.entries.keys().filter(|h| h.as_str().starts_with(p)).count() > 1)
            .unwrap();
        let err = ledger.find_by_prefix(&shared).unwrap_err();
        assert!(err.to_string().contains("More than one"));
    }
}
