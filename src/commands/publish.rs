use crate::api::{self, Mode, Publisher};
use crate::args::PublishArgs;
use crate::commands::Out;
use crate::context::RunContext;
use crate::ledger::Ledger;
use crate::publish::{self as reconciler, PublishOptions, PublishReport};
use crate::{Config, Result};
use anyhow::bail;
use tracing::info;

/// Publishes the stored receipts that match the filters to the configured Google Sheet.
///
/// Without a `sheets` section in the config there is nowhere to publish to; this is reported and
/// is not an error.
pub async fn publish(
    config: Config,
    mode: Mode,
    args: PublishArgs,
    ctx: RunContext,
) -> Result<Out<PublishReport>> {
    match api::publisher(&config, mode).await? {
        Some(mut publisher) => publish_with(&config, publisher.as_mut(), &args, &ctx).await,
        None => {
            info!("No sheets section in {}", config.config_path().display());
            Ok("Publishing is not configured, nothing was published".into())
        }
    }
}

pub(super) async fn publish_with(
    config: &Config,
    publisher: &mut (dyn Publisher + Send),
    args: &PublishArgs,
    ctx: &RunContext,
) -> Result<Out<PublishReport>> {
    let ledger = Ledger::load(config.ledger_path()).await?;
    let filter = args.filter();
    let records = ledger.records();
    let options = PublishOptions::new(args.include_excluded(), args.dry_run());
    let report = reconciler::publish(
        publisher,
        filter.apply(records.iter().copied()),
        options,
        ctx,
    )
    .await;
    finish(&report)?;
    Ok(Out::new(report.summary(), report))
}

/// Turns a report of a run that stopped early into an error naming what was not published.
pub(super) fn finish(report: &PublishReport) -> Result<()> {
    if let Some(failure) = report.failure() {
        bail!(
            "Publishing stopped after {} row(s): {}. Not published: {}. Rows already in the \
            sheet are skipped when you run it again.",
            report.appended().len(),
            failure.error(),
            failure.unpublished().join(", ")
        );
    }
    Ok(())
}
