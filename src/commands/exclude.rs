use crate::args::ExcludeArgs;
use crate::commands::Out;
use crate::ledger::Ledger;
use crate::model::ReceiptRecord;
use crate::{Config, Result};

/// Marks a stored receipt as excluded from the table, exports and the sheet, or with `--undo`
/// includes it again. The receipt stays in the ledger either way, so its image is still
/// recognized as processed.
pub async fn exclude(config: Config, args: ExcludeArgs) -> Result<Out<ReceiptRecord>> {
    let mut ledger = Ledger::open(config.ledger_path()).await?;
    let hash = ledger.find_by_prefix(args.hash())?;
    let excluded = !args.undo();
    let reason = args.reason().map(str::to_string);
    let record = ledger.set_excluded(&hash, excluded, reason)?.clone();
    ledger.save().await?;

    let verb = if excluded { "Excluded" } else { "Included" };
    Ok(Out::new(
        format!(
            "{verb} {} ({} {})",
            record.source_file(),
            record.vendor(),
            record.amount()
        ),
        record,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{record, TestEnv};
    use chrono::Utc;

    #[tokio::test]
    async fn test_exclude_and_undo() {
        let env = TestEnv::new().await;
        let a = record("a.jpg", "12.5", Some((2026, 1, 5)), "Cafe X");
        let mut ledger = Ledger::load(env.config().ledger_path()).await.unwrap();
        ledger.upsert(a.clone(), Utc::now());
        ledger.save().await.unwrap();

        let prefix = &a.content_hash().as_str()[..8];
        let out = exclude(env.config(), ExcludeArgs::new(prefix, false, Some("gift".into())))
            .await
            .unwrap();
        assert!(out.message().starts_with("Excluded a.jpg"));
        let stored = Ledger::load(env.config().ledger_path()).await.unwrap();
        let stored = stored.get(a.content_hash()).unwrap();
        assert!(stored.exclude_from_table());
        assert_eq!(stored.exclusion_reason(), Some("gift"));

        exclude(env.config(), ExcludeArgs::new(prefix, true, None))
            .await
            .unwrap();
        let stored = Ledger::load(env.config().ledger_path()).await.unwrap();
        assert!(!stored.get(a.content_hash()).unwrap().exclude_from_table());

        assert!(exclude(env.config(), ExcludeArgs::new("zz", false, None))
            .await
            .is_err());
    }
}
