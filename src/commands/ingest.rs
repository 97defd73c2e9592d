use crate::api::{self, Extractor, Mode, Publisher};
use crate::args::IngestArgs;
use crate::commands::publish::finish;
use crate::commands::Out;
use crate::context::RunContext;
use crate::export::{export, ExportFiles};
use crate::ledger::{self, IngestOptions, IngestReport, Ledger};
use crate::publish::{self as reconciler, PublishOptions, PublishReport};
use crate::render::{console_table, excluded_notes};
use crate::{inputs, Config, Result};
use serde::Serialize;
use tracing::info;

/// What `ingest` did.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutput {
    ingest: IngestReport,
    export: Option<ExportFiles>,
    publish: Option<PublishReport>,
}

impl IngestOutput {
    pub fn report(&self) -> &IngestReport {
        &self.ingest
    }

    pub fn export(&self) -> Option<&ExportFiles> {
        self.export.as_ref()
    }

    pub fn publish(&self) -> Option<&PublishReport> {
        self.publish.as_ref()
    }
}

/// Extracts the images of the receipts directory (or `--dir`) that are not in the ledger yet.
///
/// When the run extracted anything, its receipts are exported. With `--publish` they are then
/// published; a publishing failure is returned as an error after the ledger and export are
/// written.
pub async fn ingest(
    config: Config,
    mode: Mode,
    args: IngestArgs,
    ctx: RunContext,
) -> Result<Out<IngestOutput>> {
    let mut extractor = api::extractor(&config, mode).await?;
    let publisher = if args.publish() {
        api::publisher(&config, mode).await?
    } else {
        None
    };
    ingest_with(&config, extractor.as_mut(), publisher, &args, &ctx).await
}

pub(super) async fn ingest_with(
    config: &Config,
    extractor: &mut (dyn Extractor + Send),
    publisher: Option<Box<dyn Publisher + Send>>,
    args: &IngestArgs,
    ctx: &RunContext,
) -> Result<Out<IngestOutput>> {
    let dir = args
        .dir()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| config.receipts_dir());
    let found = inputs::discover(&dir).await?;
    let mut ledger = Ledger::open(config.ledger_path()).await?;

    let options = IngestOptions::new(args.force(), args.retry_undated(), config.date_attempts());
    let mut report = ledger::ingest(&mut ledger, extractor, found.images(), options, ctx).await?;
    for file in found.unreadable() {
        report.unreadable(file.file(), file.error());
    }

    let export = if report.extracted() > 0 {
        Some(export(report.records(), &config.output_dir(), ctx).await?)
    } else {
        None
    };

    let publish = match (args.publish(), publisher) {
        (false, _) => None,
        (true, None) => {
            info!("Publishing is not configured, nothing was published");
            None
        }
        (true, Some(mut publisher)) => Some(
            reconciler::publish(
                publisher.as_mut(),
                report.records().iter(),
                PublishOptions::default(),
                ctx,
            )
            .await,
        ),
    };

    let mut message = if found.is_empty() {
        format!("No receipt images found in {}", dir.display())
    } else if report.extracted() == 0 {
        format!(
            "No new receipts to process ({} already processed)",
            report.reused()
        )
    } else {
        format!(
            "Processed {} receipt(s), {} already processed, {} notice(s)",
            report.extracted(),
            report.reused(),
            report.notices().len()
        )
    };
    if let Some(files) = &export {
        message.push_str(&format!("; exported to {}", files.tsv().display()));
    }
    if let Some(published) = &publish {
        message.push_str(&format!("; {}", published.summary()));
    }

    let mut table = console_table(report.records());
    table.push_str(&excluded_notes(report.records()));
    if let Some(published) = &publish {
        finish(published)?;
    }
    Ok(Out::new(
        message,
        IngestOutput {
            ingest: report,
            export,
            publish,
        },
    )
    .with_display(table))
}
