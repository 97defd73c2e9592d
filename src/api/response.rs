//! Parses the JSON reply that an extractor produces for one image.

use crate::api::{Extraction, Rejection};
use crate::model::{parse_date, Amount, Categories, ExtractedReceipt};
use crate::Result;
use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::trace;

/// The reply schema. Field names follow the JSON the model is asked to produce.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractorReply {
    #[serde(default = "default_valid")]
    is_valid_receipt: bool,
    #[serde(default)]
    validation_error: Option<String>,
    #[serde(default)]
    amount: Option<Amount>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    vendor: Option<String>,
    #[serde(default)]
    category: Vec<String>,
    #[serde(default)]
    payment_method: Vec<String>,
    #[serde(default)]
    exclude_from_table: bool,
    #[serde(default)]
    exclusion_reason: Option<String>,
}

fn default_valid() -> bool {
    true
}

/// Turns an extractor's reply text into an `Extraction`.
///
/// A reply with `isValidReceipt: false` becomes a rejection. A reply that claims to be a receipt
/// but lacks an amount or vendor, or names a category outside the closed vocabulary, breaks the
/// extractor contract and is an error. A missing or unreadable date is not an error; the date
/// is simply absent.
pub(crate) fn parse_response(text: &str) -> Result<Extraction> {
    let json = strip_code_fence(text);
    trace!("Extractor reply: {json}");
    let reply: ExtractorReply =
        serde_json::from_str(json).context("The extractor reply is not valid JSON")?;

    if !reply.is_valid_receipt {
        let reason = reply
            .validation_error
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "The image is not a receipt".to_string());
        return Ok(Extraction::Rejected(Rejection::new(reason)));
    }

    let Some(amount) = reply.amount else {
        bail!("The extractor reply has no amount")
    };
    let vendor = reply.vendor.unwrap_or_default();
    if vendor.trim().is_empty() {
        bail!("The extractor reply has no vendor")
    }
    let categories = Categories::parse(&reply.category)
        .context("The extractor reply has an invalid category list")?;
    let date = reply.date.as_deref().and_then(parse_date);

    Ok(Extraction::Receipt(ExtractedReceipt {
        amount,
        date,
        vendor,
        categories,
        payment_methods: reply.payment_method,
        exclude_from_table: reply.exclude_from_table,
        exclusion_reason: reply.exclusion_reason,
    }))
}

/// Removes a surrounding markdown code fence (```json ... ```), which models often add.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(ix) => &rest[ix + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use chrono::NaiveDate;

    const CAFE: &str = r#"{
        "isValidReceipt": true,
        "validationError": "",
        "amount": 12.5,
        "date": "01/05/2026",
        "vendor": "Cafe X",
        "category": ["Food & Restaurants"],
        "paymentMethod": ["Card"],
        "excludeFromTable": false,
        "exclusionReason": ""
    }"#;

    #[test]
    fn test_parse_receipt() {
        let Extraction::Receipt(r) = parse_response(CAFE).unwrap() else {
            panic!("expected a receipt")
        };
        assert_eq!(r.amount.to_string(), "12.50");
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(r.vendor, "Cafe X");
        assert!(r.categories.contains(Category::FoodAndRestaurants));
        assert_eq!(r.payment_methods, vec!["Card".to_string()]);
    }

    #[test]
    fn test_parse_fenced_reply() {
        let fenced = format!("```json\n{CAFE}\n```");
        assert!(matches!(
            parse_response(&fenced).unwrap(),
            Extraction::Receipt(_)
        ));
    }

    #[test]
    fn test_parse_rejection() {
        let reply = r#"{"isValidReceipt": false, "validationError": "This is a photo of a cat"}"#;
        let Extraction::Rejected(r) = parse_response(reply).unwrap() else {
            panic!("expected a rejection")
        };
        assert_eq!(r.reason(), "This is a photo of a cat");
    }

    #[test]
    fn test_parse_missing_date_is_not_an_error() {
        let reply = r#"{"amount": "3.00", "date": "", "vendor": "Kiosk", "category": ["Other"]}"#;
        let Extraction::Receipt(r) = parse_response(reply).unwrap() else {
            panic!("expected a receipt")
        };
        assert_eq!(r.date, None);
    }

    #[test]
    fn test_parse_contract_violations() {
        let unknown = r#"{"amount": 1, "vendor": "X", "category": ["Random"]}"#;
        assert!(parse_response(unknown).is_err());
        let empty = r#"{"amount": 1, "vendor": "X", "category": []}"#;
        assert!(parse_response(empty).is_err());
        let no_amount = r#"{"vendor": "X", "category": ["Other"]}"#;
        assert!(parse_response(no_amount).is_err());
        assert!(parse_response("not json").is_err());
    }
}
