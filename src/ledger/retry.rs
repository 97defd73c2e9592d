//! Re-asking the extractor when it could not read a receipt's date.

use crate::api::{Extraction, Extractor, Rejection};
use crate::model::{ExtractedReceipt, ImageInput};
use crate::Result;
use chrono::NaiveDate;
use tracing::{debug, warn};

/// The result of extracting one image with date recovery.
#[derive(Debug, Clone)]
pub(super) enum Attempted {
    /// `receipt.date` is `None` when no attempt produced a usable date.
    Receipt {
        receipt: ExtractedReceipt,
        attempts: u32,
    },
    Rejected(Rejection),
}

/// Extracts `image`, calling the extractor again while the date is missing, up to `attempts`
/// calls in total.
///
/// Failures of the first call are returned as they are. A failure or rejection on a later call
/// ends the search and the first result is kept.
pub(super) async fn extract_with_date_retry(
    extractor: &mut (dyn Extractor + Send),
    image: &ImageInput,
    attempts: u32,
    today: NaiveDate,
) -> Result<Attempted> {
    let mut receipt = match extractor.extract(image).await? {
        Extraction::Receipt(receipt) => usable_date(receipt, today),
        Extraction::Rejected(rejection) => return Ok(Attempted::Rejected(rejection)),
    };
    if receipt.date.is_some() {
        return Ok(Attempted::Receipt {
            receipt,
            attempts: 1,
        });
    }

    let search = search_for_date(extractor, image, attempts.saturating_sub(1), today).await;
    if let Some(found) = search.found {
        receipt = found;
    }
    Ok(Attempted::Receipt {
        receipt,
        attempts: 1 + search.calls,
    })
}

/// The outcome of `search_for_date`.
#[derive(Debug, Clone)]
pub(super) struct DateSearch {
    /// The first receipt read with a usable date.
    pub(super) found: Option<ExtractedReceipt>,
    /// Extractor calls made.
    pub(super) calls: u32,
}

/// Calls the extractor up to `max_calls` times, stopping at the first receipt with a usable date
/// or at the first failure.
pub(super) async fn search_for_date(
    extractor: &mut (dyn Extractor + Send),
    image: &ImageInput,
    max_calls: u32,
    today: NaiveDate,
) -> DateSearch {
    let mut calls = 0;
    while calls < max_calls {
        calls += 1;
        debug!(
            "Asking again for the date of {} (retry {calls} of {max_calls})",
            image.file_name()
        );
        match extractor.extract(image).await {
            Ok(Extraction::Receipt(receipt)) => {
                let receipt = usable_date(receipt, today);
                if receipt.date.is_some() {
                    return DateSearch {
                        found: Some(receipt),
                        calls,
                    };
                }
            }
            Ok(Extraction::Rejected(rejection)) => {
                warn!(
                    "Stopped retrying {}: the retry was rejected ({})",
                    image.file_name(),
                    rejection.reason()
                );
                break;
            }
            Err(e) => {
                warn!("Stopped retrying {}: {e:#}", image.file_name());
                break;
            }
        }
    }
    DateSearch { found: None, calls }
}

/// Drops a date later than `today`.
fn usable_date(mut receipt: ExtractedReceipt, today: NaiveDate) -> ExtractedReceipt {
    if let Some(date) = receipt.date {
        if date > today {
            debug!("Ignoring future date {date} for {}", receipt.vendor);
            receipt.date = None;
        }
    }
    receipt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{reply, ScriptedExtractor, Scripted};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn image() -> ImageInput {
        ImageInput::new("r.jpg", b"bytes".to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_never_dated_makes_exactly_n_attempts() {
        let mut extractor = ScriptedExtractor::repeating(Scripted::Receipt(reply("9.99", None)));
        let result = extract_with_date_retry(&mut extractor, &image(), 3, today())
            .await
            .unwrap();
        let Attempted::Receipt { receipt, attempts } = result else {
            panic!("expected a receipt");
        };
        assert_eq!(attempts, 3);
        assert_eq!(receipt.date, None);
        assert_eq!(extractor.calls(), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_means_no_retry() {
        let mut extractor = ScriptedExtractor::repeating(Scripted::Receipt(reply("9.99", None)));
        extract_with_date_retry(&mut extractor, &image(), 1, today())
            .await
            .unwrap();
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_dated_attempt() {
        let mut extractor = ScriptedExtractor::new([
            Scripted::Receipt(reply("9.99", None)),
            Scripted::Receipt(reply("9.99", Some("2026-02-10"))),
            Scripted::Receipt(reply("9.99", Some("2026-02-11"))),
        ]);
        let result = extract_with_date_retry(&mut extractor, &image(), 5, today())
            .await
            .unwrap();
        let Attempted::Receipt { receipt, attempts } = result else {
            panic!("expected a receipt");
        };
        assert_eq!(attempts, 2);
        assert_eq!(receipt.date, NaiveDate::from_ymd_opt(2026, 2, 10));
        assert_eq!(extractor.calls(), 2);
    }

    #[tokio::test]
    async fn test_future_date_counts_as_missing() {
        let mut extractor = ScriptedExtractor::new([
            Scripted::Receipt(reply("9.99", Some("2027-01-01"))),
            Scripted::Receipt(reply("9.99", Some("2026-03-01"))),
        ]);
        let result = extract_with_date_retry(&mut extractor, &image(), 3, today())
            .await
            .unwrap();
        let Attempted::Receipt { receipt, attempts } = result else {
            panic!("expected a receipt");
        };
        assert_eq!(attempts, 2);
        assert_eq!(receipt.date, Some(today()));
    }

    #[tokio::test]
    async fn test_failure_during_retry_keeps_first_result() {
        let mut extractor = ScriptedExtractor::new([
            Scripted::Receipt(reply("9.99", None)),
            Scripted::Fail("connection reset".to_string()),
            Scripted::Receipt(reply("9.99", Some("2026-02-10"))),
        ]);
        let result = extract_with_date_retry(&mut extractor, &image(), 3, today())
            .await
            .unwrap();
        let Attempted::Receipt { receipt, attempts } = result else {
            panic!("expected a receipt");
        };
        assert_eq!(attempts, 2);
        assert_eq!(receipt.date, None);
        assert_eq!(receipt.amount.to_string(), "9.99");
    }

    #[tokio::test]
    async fn test_first_attempt_outcomes_pass_through() {
        let mut extractor = ScriptedExtractor::new([Scripted::Fail("timeout".to_string())]);
        assert!(extract_with_date_retry(&mut extractor, &image(), 3, today())
            .await
            .is_err());

        let mut extractor =
            ScriptedExtractor::new([Scripted::Reject("not a receipt".to_string())]);
        let result = extract_with_date_retry(&mut extractor, &image(), 3, today())
            .await
            .unwrap();
        assert!(matches!(result, Attempted::Rejected(r) if r.reason() == "not a receipt"));
        assert_eq!(extractor.calls(), 1);
    }
}
