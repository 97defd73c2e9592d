//! These structs provide the CLI interface for the receipt-ranger CLI.

use crate::model::{Amount, Category, Period};
use crate::render::ReceiptFilter;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// receipt-ranger: Extract, deduplicate and publish receipts.
///
/// Point this program at a directory of receipt images. Each new image is sent to an LLM, which
/// reads the amount, date, vendor and category. Results are remembered by the content hash of
/// the image, so an image is never extracted twice, and can be printed as a table, exported to
/// JSON and TSV files, and published to a Google Sheet with one tab per month. Publishing never
/// adds a row whose date, amount and vendor are already in the tab.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and initialize the configuration file.
    ///
    /// This is the first command you should run. Decide where you want to keep your data and
    /// pass it as --home (the default is $HOME/receipt-ranger). Receipt images go into its
    /// `receipts` directory and exports are written to its `output` directory.
    ///
    /// To publish to a Google Sheet, pass its URL as --sheet-url and put a JSON file holding an
    /// `access_token` at --token-path.
    Init(InitArgs),
    /// Extract receipts from the images that have not been processed yet.
    Ingest(IngestArgs),
    /// Print the stored receipts as a table, optionally filtered, optionally exported.
    Table(TableArgs),
    /// Publish stored receipts to the Google Sheet, one tab per month.
    Publish(PublishArgs),
    /// Exclude a stored receipt from the table, exports and the sheet, or include it again.
    Exclude(ExcludeArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where receipt-ranger data and configuration is held. Defaults to
    /// ~/receipt-ranger
    #[arg(long, env = "RECEIPT_RANGER_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// Args for the `receipt-ranger init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of the Google Sheet to publish to. It looks like this:
    /// https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL
    #[arg(long)]
    sheet_url: Option<String>,

    /// The path to a JSON file with a Google `access_token`. Relative paths are relative to the
    /// home directory. Defaults to .secrets/token.json
    #[arg(long, requires = "sheet_url")]
    token_path: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(sheet_url: Option<String>, token_path: Option<PathBuf>) -> Self {
        Self {
            sheet_url,
            token_path,
        }
    }

    pub fn sheet_url(&self) -> Option<&str> {
        self.sheet_url.as_deref()
    }

    pub fn token_path(&self) -> Option<&Path> {
        self.token_path.as_deref()
    }
}

/// Args for the `receipt-ranger ingest` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct IngestArgs {
    /// Extract every image again, replacing the stored results.
    #[arg(long)]
    force: bool,

    /// Read images from this directory instead of the configured receipts directory.
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Publish the receipts of this run to the Google Sheet afterwards.
    #[arg(long)]
    publish: bool,

    /// Ask the extractor again for the date of stored receipts that have none.
    #[arg(long)]
    retry_undated: bool,
}

impl IngestArgs {
    pub fn new(force: bool, dir: Option<PathBuf>, publish: bool, retry_undated: bool) -> Self {
        Self {
            force,
            dir,
            publish,
            retry_undated,
        }
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn publish(&self) -> bool {
        self.publish
    }

    pub fn retry_undated(&self) -> bool {
        self.retry_undated
    }
}

/// Filters shared by `table` and `publish`. All given filters must match.
#[derive(Debug, Parser, Clone, Default)]
pub struct FilterArgs {
    /// Only receipts dated in this month, given as YYYY-MM.
    #[arg(long, value_parser = parse_month)]
    month: Option<Period>,

    /// Only receipts whose vendor contains this text, ignoring case.
    #[arg(long)]
    vendor: Option<String>,

    /// Only receipts of at least this amount.
    #[arg(long)]
    min_amount: Option<Amount>,

    /// Only receipts of at most this amount.
    #[arg(long)]
    max_amount: Option<Amount>,

    /// Only receipts with this category, e.g. "Food & Restaurants".
    #[arg(long)]
    category: Option<Category>,
}

impl FilterArgs {
    pub fn new(
        month: Option<Period>,
        vendor: Option<String>,
        min_amount: Option<Amount>,
        max_amount: Option<Amount>,
        category: Option<Category>,
    ) -> Self {
        Self {
            month,
            vendor,
            min_amount,
            max_amount,
            category,
        }
    }

    pub fn filter(&self) -> ReceiptFilter {
        ReceiptFilter::new(
            self.month,
            self.vendor.clone(),
            self.min_amount,
            self.max_amount,
            self.category,
        )
    }
}

fn parse_month(s: &str) -> Result<Period, String> {
    Period::parse(s).ok_or_else(|| format!("'{s}' is not a month, expected YYYY-MM"))
}

/// Args for the `receipt-ranger table` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct TableArgs {
    /// Show every stored receipt. Filters are ignored.
    #[arg(long)]
    all: bool,

    /// Also write the shown receipts to JSON and TSV files in the output directory.
    #[arg(long)]
    export: bool,

    #[clap(flatten)]
    filter: FilterArgs,
}

impl TableArgs {
    pub fn new(all: bool, export: bool, filter: FilterArgs) -> Self {
        Self {
            all,
            export,
            filter,
        }
    }

    pub fn all(&self) -> bool {
        self.all
    }

    pub fn export(&self) -> bool {
        self.export
    }

    /// The effective filter: empty when `--all` is given.
    pub fn filter(&self) -> ReceiptFilter {
        if self.all {
            ReceiptFilter::default()
        } else {
            self.filter.filter()
        }
    }
}

/// Args for the `receipt-ranger publish` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct PublishArgs {
    /// Also publish receipts that are excluded from the table.
    #[arg(long)]
    include_excluded: bool,

    /// Report what would be published without changing the sheet.
    #[arg(long)]
    dry_run: bool,

    #[clap(flatten)]
    filter: FilterArgs,
}

impl PublishArgs {
    pub fn new(include_excluded: bool, dry_run: bool, filter: FilterArgs) -> Self {
        Self {
            include_excluded,
            dry_run,
            filter,
        }
    }

    pub fn include_excluded(&self) -> bool {
        self.include_excluded
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn filter(&self) -> ReceiptFilter {
        self.filter.filter()
    }
}

/// Args for the `receipt-ranger exclude` command.
#[derive(Debug, Parser, Clone)]
pub struct ExcludeArgs {
    /// The content hash of the receipt, or a prefix of it long enough to be unique. Hashes are
    /// shown by `table` at debug log level and in the JSON exports.
    hash: String,

    /// Include the receipt again.
    #[arg(long, conflicts_with = "reason")]
    undo: bool,

    /// Why the receipt is excluded.
    #[arg(long)]
    reason: Option<String>,
}

impl ExcludeArgs {
    pub fn new(hash: impl Into<String>, undo: bool, reason: Option<String>) -> Self {
        Self {
            hash: hash.into(),
            undo,
            reason,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn undo(&self) -> bool {
        self.undo
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("receipt-ranger"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or RECEIPT_RANGER_HOME instead of relying on the \
                default directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("receipt-ranger")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(
            ["receipt-ranger", "--home", "/tmp/rr"]
                .iter()
                .chain(args.iter()),
        )
        .unwrap()
    }

    #[test]
    fn test_table_filters() {
        let args = parse(&[
            "table",
            "--month",
            "2026-01",
            "--vendor",
            "cafe",
            "--min-amount",
            "$10",
            "--category",
            "food and restaurants",
        ]);
        let Command::Table(table) = args.command() else {
            panic!("expected table");
        };
        assert!(!table.filter().is_empty());
        let expected = ReceiptFilter::new(
            Period::parse("2026-01"),
            Some("cafe".to_string()),
            Amount::from_str("10").ok(),
            None,
            Some(Category::FoodAndRestaurants),
        );
        assert_eq!(table.filter(), expected);
        assert_eq!(args.common().home().path(), Path::new("/tmp/rr"));
    }

    #[test]
    fn test_table_all_ignores_filters() {
        let args = parse(&["table", "--all", "--vendor", "cafe"]);
        let Command::Table(table) = args.command() else {
            panic!("expected table");
        };
        assert!(table.filter().is_empty());
    }

    #[test]
    fn test_bad_values_are_rejected() {
        let bad = [
            vec!["table", "--month", "January"],
            vec!["table", "--category", "Groceries and Gas"],
            vec!["table", "--min-amount", "ten"],
            vec!["exclude", "abc", "--undo", "--reason", "x"],
            vec!["init", "--token-path", "t.json"],
        ];
        for args in bad {
            let argv = ["receipt-ranger"].into_iter().chain(args.iter().copied());
            assert!(Args::try_parse_from(argv).is_err(), "{args:?}");
        }
    }

    #[test]
    fn test_ingest_flags() {
        let args = parse(&["ingest", "--force", "--publish", "--dir", "scans"]);
        let Command::Ingest(ingest) = args.command() else {
            panic!("expected ingest");
        };
        assert!(ingest.force());
        assert!(ingest.publish());
        assert!(!ingest.retry_undated());
        assert_eq!(ingest.dir(), Some(Path::new("scans")));
    }
}
