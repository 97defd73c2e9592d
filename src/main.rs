use clap::Parser;
use receipt_ranger::args::{Args, Command};
use receipt_ranger::{commands, Config, Mode, Result, RunContext};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // This allows for running the program without hitting the LLM or Google APIs. When
    // RECEIPT_RANGER_IN_TEST_MODE is set and non-zero in length, then the mode will be
    // Mode::Test, otherwise it will be Mode::Live.
    let mode = Mode::from_env();
    let ctx = RunContext::new();
    debug!("Run {} started in {mode} mode", ctx.run_id());

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.sheet_url(), init_args.token_path())
                .await?
                .print()
        }

        Command::Ingest(ingest_args) => {
            let config = Config::load(home).await?;
            commands::ingest(config, mode, ingest_args.clone(), ctx)
                .await?
                .print()
        }

        Command::Table(table_args) => {
            let config = Config::load(home).await?;
            commands::table(config, table_args.clone(), ctx)
                .await?
                .print()
        }

        Command::Publish(publish_args) => {
            let config = Config::load(home).await?;
            commands::publish(config, mode, publish_args.clone(), ctx)
                .await?
                .print()
        }

        Command::Exclude(exclude_args) => {
            let config = Config::load(home).await?;
            commands::exclude(config, exclude_args.clone())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only. The library
            // and the binary share the crate name.
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
