//! The business identity used to detect receipts that already exist in a spreadsheet.

use crate::model::{parse_date, serial_date, Amount, ReceiptRecord};
use crate::render::{AMOUNT_COL, DATE_COL, VENDOR_COL};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// `(date, amount, vendor)`: two images of the same physical receipt have different content
/// hashes but the same publication key.
///
/// Dates compare as calendar dates, amounts by numeric value and vendors after trimming and
/// case folding, so a row typed by hand as `01/05/2026 | $12.50 | cafe x` matches a record
/// rendered as `1/5/2026 | 12.50 | Cafe X`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PublicationKey {
    date: NaiveDate,
    amount: Decimal,
    vendor: String,
}

impl PublicationKey {
    pub fn new(date: NaiveDate, amount: Amount, vendor: &str) -> Self {
        Self {
            date,
            amount: amount.normalized(),
            vendor: vendor.trim().to_lowercase(),
        }
    }

    /// The key of a record, or `None` when the record has no date.
    pub fn from_record(record: &ReceiptRecord) -> Option<Self> {
        let date = record.date()?;
        Some(Self::new(date, record.amount(), record.vendor()))
    }

    /// The key of an existing sheet row, or `None` when the row lacks a parsable date or amount,
    /// or has an empty vendor. The date may be displayed text or a date serial number.
    pub fn from_row<S: AsRef<str>>(row: &[S], columns: &SheetColumns) -> Option<Self> {
        let cell = |ix: usize| row.get(ix).map(|s| s.as_ref().trim()).unwrap_or_default();
        let date = parse_date(cell(columns.date)).or_else(|| serial_date(cell(columns.date)))?;
        let amount = Amount::from_str(cell(columns.amount)).ok()?;
        let vendor = cell(columns.vendor);
        if vendor.is_empty() {
            return None;
        }
        Some(Self::new(date, amount, vendor))
    }
}

/// Where the key columns sit in an existing sheet.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SheetColumns {
    amount: usize,
    date: usize,
    vendor: usize,
}

impl Default for SheetColumns {
    /// The positions written by the renderer.
    fn default() -> Self {
        Self {
            amount: AMOUNT_COL,
            date: DATE_COL,
            vendor: VENDOR_COL,
        }
    }
}

impl SheetColumns {
    /// Locates the columns by name in a header row. Returns `None` unless all three of `Amount`,
    /// `Date` and `Vendor` are present.
    pub fn from_header<S: AsRef<str>>(header: &[S]) -> Option<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.as_ref().trim().eq_ignore_ascii_case(name))
        };
        Some(Self {
            amount: find("Amount")?,
            date: find("Date")?,
            vendor: find("Vendor")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_row_keys_normalize() {
        let cols = SheetColumns::default();
        let a = PublicationKey::from_row(&row(&["12.50", "1/5/2026", "", "Cafe X"]), &cols);
        let b = PublicationKey::from_row(&row(&["$12.5", "01/05/2026", "", " cafe x "]), &cols);
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_unformatted_row_matches_record_key() {
        let cols = SheetColumns::default();
        let unformatted = PublicationKey::from_row(&row(&["12.5", "46027", "", "Cafe X"]), &cols);
        let displayed = PublicationKey::from_row(&row(&["12.50", "1/5/2026", "", "Cafe X"]), &cols);
        assert!(unformatted.is_some());
        assert_eq!(unformatted, displayed);
    }

    #[test]
    fn test_row_missing_fields() {
        let cols = SheetColumns::default();
        assert!(PublicationKey::from_row(&row(&["12.50", "1/5/2026", "", ""]), &cols).is_none());
        assert!(PublicationKey::from_row(&row(&["abc", "1/5/2026", "", "X"]), &cols).is_none());
        assert!(PublicationKey::from_row(&row(&["12.50", "", "", "X"]), &cols).is_none());
        assert!(PublicationKey::from_row(&row(&["12.50"]), &cols).is_none());
    }

    #[test]
    fn test_header_detection() {
        let header = row(&["Vendor", "Notes", "Date", "Amount"]);
        let cols = SheetColumns::from_header(&header).unwrap();
        let key = PublicationKey::from_row(&row(&["Cafe X", "", "1/5/2026", "12.5"]), &cols);
        let expected = PublicationKey::new(
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            Amount::from_str("12.50").unwrap(),
            "Cafe X",
        );
        assert_eq!(key, Some(expected));

        assert!(SheetColumns::from_header(&row(&["12.50", "1/5/2026", "", "Cafe X"])).is_none());
        assert_eq!(
            SheetColumns::from_header(&row(&["Amount", "Date", "", "Vendor", "Category"])),
            Some(SheetColumns::default())
        );
    }
}
