use crate::model::{Amount, Categories};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// The SHA-256 digest of an image's bytes, as lowercase hex. This is the local dedup key.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first 12 hex digits, for log lines and notices.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fields an extractor reads off a receipt image.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExtractedReceipt {
    pub amount: Amount,
    pub date: Option<NaiveDate>,
    pub vendor: String,
    pub categories: Categories,
    pub payment_methods: Vec<String>,
    pub exclude_from_table: bool,
    pub exclusion_reason: Option<String>,
}

/// A receipt as held in the ledger.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReceiptRecord {
    /// Internal identifier. Never shown in the table.
    id: Uuid,
    content_hash: ContentHash,
    amount: Amount,
    /// `None` when the date could not be read. Such records are never published.
    date: Option<NaiveDate>,
    vendor: String,
    categories: Categories,
    /// Internal only, not rendered in the table.
    #[serde(default)]
    payment_methods: Vec<String>,
    #[serde(default)]
    exclude_from_table: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exclusion_reason: Option<String>,
    source_file: String,
}

impl ReceiptRecord {
    /// Creates a record with a fresh id.
    pub fn new(
        content_hash: ContentHash,
        source_file: impl Into<String>,
        extracted: ExtractedReceipt,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), content_hash, source_file, extracted)
    }

    /// Creates a record that keeps an existing id, used when a forced re-extraction replaces a
    /// stored record.
    pub fn with_id(
        id: Uuid,
        content_hash: ContentHash,
        source_file: impl Into<String>,
        extracted: ExtractedReceipt,
    ) -> Self {
        Self {
            id,
            content_hash,
            amount: extracted.amount,
            date: extracted.date,
            vendor: extracted.vendor.trim().to_string(),
            categories: extracted.categories,
            payment_methods: extracted.payment_methods,
            exclude_from_table: extracted.exclude_from_table,
            exclusion_reason: extracted
                .exclusion_reason
                .filter(|r| !r.trim().is_empty()),
            source_file: source_file.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn payment_methods(&self) -> &[String] {
        &self.payment_methods
    }

    pub fn exclude_from_table(&self) -> bool {
        self.exclude_from_table
    }

    pub fn exclusion_reason(&self) -> Option<&str> {
        self.exclusion_reason.as_deref()
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub(crate) fn set_excluded(&mut self, excluded: bool, reason: Option<String>) {
        self.exclude_from_table = excluded;
        self.exclusion_reason = if excluded { reason } else { None };
    }

    pub(crate) fn backfill_date(&mut self, date: NaiveDate) {
        self.date = Some(date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use std::str::FromStr;

    #[test]
    fn test_content_hash() {
        let a = ContentHash::of(b"hello world");
        let b = ContentHash::of(b"hello world");
        let c = ContentHash::of(b"hello");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(a.short(), "b94d27b9934d");
    }

    #[test]
    fn test_record_serde_shape() {
        let record = ReceiptRecord::new(
            ContentHash::of(b"x"),
            "a.jpg",
            ExtractedReceipt {
                amount: Amount::from_str("12.5").unwrap(),
                date: NaiveDate::from_ymd_opt(2026, 1, 5),
                vendor: " Cafe X ".to_string(),
                categories: Categories::single(Category::FoodAndRestaurants),
                payment_methods: vec!["Card".to_string()],
                exclude_from_table: false,
                exclusion_reason: Some(String::new()),
            },
        );
        assert_eq!(record.vendor(), "Cafe X");
        assert_eq!(record.exclusion_reason(), None);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["amount"], "12.50");
        assert_eq!(json["date"], "2026-01-05");
        assert_eq!(json["categories"][0], "Food & Restaurants");
        assert!(json.get("exclusion_reason").is_none());

        let back: ReceiptRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
