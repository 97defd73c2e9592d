//! Renders receipt records as table rows: for the terminal, for TSV export and for the sheet.
//!
//! Every output shares one column layout, `Amount, Date, <blank>, Vendor, Category`. The blank
//! column is kept so that rows pasted into a sheet line up with the hand-maintained columns.
//! Excluded records are never rendered as rows; `excluded_notes` names them instead.

use crate::model::{sheet_date, Amount, Category, Period, ReceiptRecord};
use crate::Result;
use anyhow::Context;
use std::io::Write;

/// The header row.
pub const HEADER: [&str; COLUMN_COUNT] = ["Amount", "Date", "", "Vendor", "Category"];
pub const COLUMN_COUNT: usize = 5;
pub const AMOUNT_COL: usize = 0;
pub const DATE_COL: usize = 1;
pub const VENDOR_COL: usize = 3;
pub const CATEGORY_COL: usize = 4;

/// The header row as owned strings, as appended to a new sheet.
pub fn header_row() -> Vec<String> {
    HEADER.iter().map(|s| s.to_string()).collect()
}

/// Renders one record. An absent date is an empty cell.
pub fn table_row(record: &ReceiptRecord) -> Vec<String> {
    let mut row = vec![String::new(); COLUMN_COUNT];
    row[AMOUNT_COL] = record.amount().to_string();
    row[DATE_COL] = record.date().map(sheet_date).unwrap_or_default();
    row[VENDOR_COL] = record.vendor().to_string();
    row[CATEGORY_COL] = record.categories().display_cell();
    row
}

/// Renders one record for a sheet appended to with user-entered values. Text cells that a
/// spreadsheet would read as a formula (or as a quote prefix) get a leading `'`, so they are
/// stored as the literal text.
pub fn sheet_row(record: &ReceiptRecord) -> Vec<String> {
    let mut row = table_row(record);
    for ix in [VENDOR_COL, CATEGORY_COL] {
        row[ix] = literal_text(&row[ix]);
    }
    row
}

fn literal_text(cell: &str) -> String {
    if cell.starts_with(['=', '+', '-', '@', '\'']) {
        format!("'{cell}")
    } else {
        cell.to_string()
    }
}

/// The records that may appear in a table or an export, in their given order.
pub fn visible<'a, I>(records: I) -> impl Iterator<Item = &'a ReceiptRecord>
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    records.into_iter().filter(|r| !r.exclude_from_table())
}

/// One line per excluded record naming the vendor, the file and the reason, for printing below
/// a table. Empty when nothing is excluded.
pub fn excluded_notes<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    records
        .into_iter()
        .filter(|r| r.exclude_from_table())
        .map(|r| {
            format!(
                "Excluded: {} ({}): {}\n",
                r.vendor(),
                r.source_file(),
                r.exclusion_reason().unwrap_or("no reason given")
            )
        })
        .collect()
}

/// Writes the header and one tab-separated line per visible record.
pub fn write_tsv<'a, W, I>(records: I, writer: W) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(HEADER).context("Unable to write the TSV header")?;
    for record in visible(records) {
        wtr.write_record(table_row(record))
            .with_context(|| format!("Unable to write the TSV row for {}", record.source_file()))?;
    }
    wtr.flush().context("Unable to flush the TSV writer")?;
    Ok(())
}

/// `write_tsv` into a `String`.
pub fn tsv_string<'a, I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    let mut buf = Vec::new();
    write_tsv(records, &mut buf)?;
    String::from_utf8(buf).context("The TSV output is not valid UTF-8")
}

/// An aligned plain-text table for the terminal. Returns only the header line when there is
/// nothing to show.
pub fn console_table<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a ReceiptRecord>,
{
    let rows: Vec<Vec<String>> = visible(records).map(table_row).collect();
    let mut widths: Vec<usize> = HEADER.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(ix, (cell, w))| {
                if ix == AMOUNT_COL {
                    format!("{cell:>w$}")
                } else {
                    format!("{cell:<w$}")
                }
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = line(&header_row());
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

/// Optional predicates for choosing records. All given predicates must hold.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ReceiptFilter {
    month: Option<Period>,
    vendor: Option<String>,
    min_amount: Option<Amount>,
    max_amount: Option<Amount>,
    category: Option<Category>,
}

impl ReceiptFilter {
    pub fn new(
        month: Option<Period>,
        vendor: Option<String>,
        min_amount: Option<Amount>,
        max_amount: Option<Amount>,
        category: Option<Category>,
    ) -> Self {
        Self {
            month,
            vendor: vendor
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty()),
            min_amount,
            max_amount,
            category,
        }
    }

    /// True when no predicate is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// A record without a date never matches a month filter. The vendor filter is a
    /// case-insensitive substring match.
    pub fn matches(&self, record: &ReceiptRecord) -> bool {
        if let Some(month) = self.month {
            match record.date() {
                Some(date) if month.contains(date) => {}
                _ => return false,
            }
        }
        if let Some(vendor) = &self.vendor {
            if !record.vendor().to_lowercase().contains(vendor.as_str()) {
                return false;
            }
        }
        if self.min_amount.is_some_and(|min| record.amount() < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| record.amount() > max) {
            return false;
        }
        if let Some(category) = self.category {
            if !record.categories().contains(category) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a, I>(&'a self, records: I) -> impl Iterator<Item = &'a ReceiptRecord> + 'a
    where
        I: IntoIterator<Item = &'a ReceiptRecord>,
        I::IntoIter: 'a,
    {
        records.into_iter().filter(move |r| self.matches(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::record_with as record;
    use std::str::FromStr;

    fn cafe() -> ReceiptRecord {
        record(
            "receiptA.jpg",
            "12.5",
            Some((2026, 1, 5)),
            "Cafe X",
            &[Category::FoodAndRestaurants],
        )
    }

    #[test]
    fn test_tsv_row() {
        let tsv = tsv_string([&cafe()]).unwrap();
        assert_eq!(
            tsv,
            "Amount\tDate\t\tVendor\tCategory\n12.50\t1/5/2026\t\tCafe X\tFood & Restaurants\n"
        );
    }

    #[test]
    fn test_row_without_date_and_many_categories() {
        let r = record(
            "b.jpg",
            "1234.5",
            None,
            "Best Buy",
            &[Category::Electronics, Category::Entertainment],
        );
        assert_eq!(
            table_row(&r),
            ["1234.50", "", "", "Best Buy", "Electronics, Entertainment"]
        );
    }

    #[test]
    fn test_sheet_row_keeps_formulas_literal() {
        let r = record(
            "g.jpg",
            "9",
            Some((2026, 1, 7)),
            "=HYPERLINK(\"http://x\")",
            &[Category::Other],
        );
        let row = sheet_row(&r);
        assert_eq!(row[VENDOR_COL], "'=HYPERLINK(\"http://x\")");
        assert_eq!(row[CATEGORY_COL], "Other");
        assert_eq!(table_row(&r)[VENDOR_COL], "=HYPERLINK(\"http://x\")");

        for vendor in ["+1 Deli", "-Mart", "@home", "'quoted"] {
            let r = record("h.jpg", "1", None, vendor, &[Category::Other]);
            assert_eq!(sheet_row(&r)[VENDOR_COL], format!("'{vendor}"));
        }
        assert_eq!(sheet_row(&cafe()), table_row(&cafe()));
    }

    #[test]
    fn test_excluded_records_are_not_rendered() {
        let mut hidden = record("c.jpg", "5", Some((2026, 1, 6)), "Payroll", &[Category::Other]);
        hidden.set_excluded(true, Some("income".to_string()));
        let shown = cafe();

        let tsv = tsv_string([&hidden, &shown]).unwrap();
        assert!(!tsv.contains("Payroll"));
        assert!(tsv.contains("Cafe X"));

        let table = console_table([&hidden, &shown]);
        assert!(!table.contains("Payroll"));
        assert!(table.contains("Cafe X"));

        assert_eq!(
            excluded_notes([&hidden, &shown]),
            "Excluded: Payroll (c.jpg): income\n"
        );
        assert_eq!(excluded_notes([&shown]), "");
    }

    #[test]
    fn test_console_table_alignment() {
        let a = cafe();
        let b = record("d.jpg", "100", Some((2026, 12, 25)), "Z", &[Category::GiftsAndDonations]);
        let table = console_table([&a, &b]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Amount"));
        assert!(lines[2].starts_with(" 12.50  1/5/2026"));
        assert!(lines[3].starts_with("100.00  12/25/2026"));
    }

    #[test]
    fn test_filter_composes_with_and() {
        let jan = cafe();
        let feb = record(
            "e.jpg",
            "40",
            Some((2026, 2, 1)),
            "Corner Grocery",
            &[Category::Groceries],
        );
        let undated = record("f.jpg", "3", None, "Cafe Y", &[Category::FoodAndRestaurants]);
        let all = [jan.clone(), feb.clone(), undated.clone()];

        let none = ReceiptFilter::default();
        assert!(none.is_empty());
        assert_eq!(none.apply(&all).count(), 3);

        let by_month = ReceiptFilter::new(Period::parse("2026-01"), None, None, None, None);
        assert_eq!(by_month.apply(&all).collect::<Vec<_>>(), [&jan]);

        let by_vendor = ReceiptFilter::new(None, Some(" CAFE ".into()), None, None, None);
        assert_eq!(by_vendor.apply(&all).collect::<Vec<_>>(), [&jan, &undated]);

        let amount = ReceiptFilter::new(
            None,
            Some("cafe".into()),
            Amount::from_str("10").ok(),
            Amount::from_str("12.50").ok(),
            None,
        );
        assert_eq!(amount.apply(&all).collect::<Vec<_>>(), [&jan]);

        let category = ReceiptFilter::new(None, None, None, None, Some(Category::Groceries));
        assert_eq!(category.apply(&all).collect::<Vec<_>>(), [&feb]);

        let contradiction = ReceiptFilter::new(
            Period::parse("2026-02"),
            Some("cafe".into()),
            None,
            None,
            None,
        );
        assert_eq!(contradiction.apply(&all).count(), 0);
    }
}
