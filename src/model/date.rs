//! Calendar date parsing and the spreadsheet date format.

use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;

/// Formats tried, in order, for anything that is not a slash-separated numeric date.
const NAMED_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"];

/// Parses a date as written on a receipt, by the extractor, or by a spreadsheet.
///
/// Slash dates are read month first (`1/5/2026`, `01/05/2026`); a two-digit year is taken to be
/// in the 2000s (`02/05/26` is February 5th, 2026). Returns `None` when nothing matches.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 3 {
        let month: u32 = parts[0].trim().parse().ok()?;
        let day: u32 = parts[1].trim().parse().ok()?;
        let year_str = parts[2].trim();
        let year: i32 = match year_str.len() {
            2 => 2000 + year_str.parse::<i32>().ok()?,
            4 => year_str.parse().ok()?,
            _ => return None,
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    NAMED_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

/// Reads a spreadsheet date serial number, the days since 1899-12-30, as returned for date
/// cells by an unformatted read. A fractional part (the time of day) is dropped.
pub fn serial_date(s: &str) -> Option<NaiveDate> {
    let serial: f64 = s.trim().parse().ok()?;
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Renders `date` the way a US-locale spreadsheet displays it: `M/D/YYYY` without zero padding.
pub fn sheet_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}

/// A (month, year) pair. Each period is published to its own sheet tab.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYY-MM`, as accepted by the `--month` filter.
    pub fn parse(s: &str) -> Option<Self> {
        let (y, m) = s.trim().split_once('-')?;
        let year: i32 = y.parse().ok()?;
        let month: u32 = m.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::of)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    /// The sheet tab name, e.g. `January 2026`.
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => first.format("%B %Y").to_string(),
            None => format!("{:04}-{:02}", self.year, self.month),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_slash_dates() {
        assert_eq!(parse_date("02/12/2026"), Some(ymd(2026, 2, 12)));
        assert_eq!(parse_date("2/6/2026"), Some(ymd(2026, 2, 6)));
        assert_eq!(parse_date("02/05/26"), Some(ymd(2026, 2, 5)));
        assert_eq!(parse_date("12/31/2026"), Some(ymd(2026, 12, 31)));
    }

    #[test]
    fn test_parse_other_formats() {
        assert_eq!(parse_date("2026-02-12"), Some(ymd(2026, 2, 12)));
        assert_eq!(parse_date("January 5, 2026"), Some(ymd(2026, 1, 5)));
        assert_eq!(parse_date("Jan 5, 2026"), Some(ymd(2026, 1, 5)));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("13/01/2026"), None);
        assert_eq!(parse_date("1/5/202"), None);
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(serial_date("46027"), Some(ymd(2026, 1, 5)));
        assert_eq!(serial_date("46027.75"), Some(ymd(2026, 1, 5)));
        assert_eq!(serial_date("1/5/2026"), None);
        assert_eq!(serial_date("-3"), None);
        assert_eq!(serial_date("NaN"), None);
    }

    #[test]
    fn test_sheet_date_has_no_padding() {
        assert_eq!(sheet_date(ymd(2026, 1, 5)), "1/5/2026");
        assert_eq!(sheet_date(ymd(2026, 12, 5)), "12/5/2026");
        assert_eq!(sheet_date(ymd(2026, 12, 31)), "12/31/2026");
    }

    #[test]
    fn test_period() {
        let jan = Period::of(ymd(2026, 1, 5));
        assert_eq!(jan.label(), "January 2026");
        assert_eq!(Period::parse("2026-01"), Some(jan));
        assert!(jan.contains(ymd(2026, 1, 31)));
        assert!(!jan.contains(ymd(2025, 1, 31)));
        assert!(jan < Period::of(ymd(2026, 2, 1)));
        assert_eq!(Period::parse("2026-13"), None);
        assert_eq!(Period::parse("January"), None);
    }
}
