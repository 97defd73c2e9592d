use chrono::{DateTime, Local, NaiveDate};
use uuid::Uuid;

const FILE_STAMP: &str = "%Y%m%d-%H%M%S";

/// State that belongs to one invocation of a command: when it started, what day it is, and an id
/// that ties together the log lines of the run. Passed to every stage instead of reading the
/// clock in many places.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RunContext {
    started: DateTime<Local>,
    run_id: Uuid,
}

impl RunContext {
    pub fn new() -> Self {
        Self::at(Local::now())
    }

    /// A context with a fixed start time.
    pub fn at(started: DateTime<Local>) -> Self {
        Self {
            started,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    /// The calendar day the run started on. Extracted dates after this day are not trusted.
    pub fn today(&self) -> NaiveDate {
        self.started.date_naive()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The start time as used in export file names, e.g. `20260105-093000`.
    pub fn file_stamp(&self) -> String {
        self.started.format(FILE_STAMP).to_string()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_stamp_and_today() {
        let started = Local.with_ymd_and_hms(2026, 1, 5, 9, 3, 7).unwrap();
        let ctx = RunContext::at(started);
        assert_eq!(ctx.file_stamp(), "20260105-090307");
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_ne!(ctx.run_id(), RunContext::at(started).run_id());
    }
}
