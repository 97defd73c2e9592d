//! The two external services this program talks to: a receipt `Extractor` (an LLM) and a
//! spreadsheet `Publisher` (Google Sheets). Both are traits so that tests, and test mode, can
//! run the whole program without network access.

mod echo_extractor;
mod google_sheet;
mod llm_extractor;
mod response;
mod test_sheet;

use crate::model::{ExtractedReceipt, ImageInput};
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub(crate) use echo_extractor::EchoExtractor;
pub(crate) use google_sheet::GoogleSheet;
pub(crate) use llm_extractor::LlmExtractor;
pub(crate) use response::parse_response;
pub use test_sheet::TestSheet;

/// When this environment variable is set and non-empty the program runs in `Mode::Test`.
pub const TEST_MODE_ENV: &str = "RECEIPT_RANGER_IN_TEST_MODE";

/// Selects real services or offline stand-ins.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Talk to the configured LLM endpoint and Google Sheets.
    #[default]
    Live,
    /// Treat image bytes as the extractor's JSON reply and publish to an in-memory sheet.
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// The extractor declined an image, e.g. because it is not a receipt.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    reason: String,
}

impl Rejection {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// The outcome of one extractor call that reached the service.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Extraction {
    Receipt(ExtractedReceipt),
    Rejected(Rejection),
}

/// Reads a receipt out of an image. An `Err` means the call itself failed (network, auth,
/// malformed reply); a judgement about the image is an `Extraction::Rejected`.
#[async_trait::async_trait]
pub trait Extractor {
    async fn extract(&mut self, image: &ImageInput) -> Result<Extraction>;
}

/// A tab in the remote spreadsheet.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SheetHandle {
    title: String,
    sheet_id: Option<i64>,
    created: bool,
}

impl SheetHandle {
    pub fn new(title: impl Into<String>, sheet_id: Option<i64>, created: bool) -> Self {
        Self {
            title: title.into(),
            sheet_id,
            created,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sheet_id(&self) -> Option<i64> {
        self.sheet_id
    }

    /// True when the tab did not exist and was created by this call.
    pub fn created(&self) -> bool {
        self.created
    }
}

/// The spreadsheet operations needed to publish receipts without duplicating rows.
#[async_trait::async_trait]
pub trait Publisher {
    /// Looks up a tab by title without creating it.
    async fn find_sheet(&mut self, title: &str) -> Result<Option<SheetHandle>>;

    /// Adds a new, empty tab.
    async fn create_sheet(&mut self, title: &str) -> Result<SheetHandle>;

    /// Returns all rows of the tab, header included, as displayed strings.
    async fn read_rows(&mut self, sheet: &SheetHandle) -> Result<Vec<Vec<String>>>;

    /// Appends one row after the last row of the tab.
    async fn append_row(&mut self, sheet: &SheetHandle, row: &[String]) -> Result<()>;

    async fn find_or_create_sheet(&mut self, title: &str) -> Result<SheetHandle> {
        match self.find_sheet(title).await? {
            Some(handle) => Ok(handle),
            None => self.create_sheet(title).await,
        }
    }
}

/// Creates the extractor for `mode`.
pub async fn extractor(config: &Config, mode: Mode) -> Result<Box<dyn Extractor + Send>> {
    debug!("Creating extractor in {mode} mode");
    Ok(match mode {
        Mode::Live => Box::new(LlmExtractor::new(config).await?),
        Mode::Test => Box::new(EchoExtractor),
    })
}

/// Creates the publisher for `mode`, or returns `None` when publishing is not configured. A
/// configured sheet whose token file is missing also disables publishing.
pub async fn publisher(config: &Config, mode: Mode) -> Result<Option<Box<dyn Publisher + Send>>> {
    let Some(sheets) = config.sheets() else {
        debug!("No sheets section in the config, publishing is disabled");
        return Ok(None);
    };
    if mode == Mode::Live && !sheets.token_path().is_file() {
        warn!(
            "No Google Sheets token file at {}, publishing is disabled",
            sheets.token_path().display()
        );
        return Ok(None);
    }
    Ok(Some(match mode {
        Mode::Live => Box::new(GoogleSheet::new(sheets).await?),
        Mode::Test => Box::new(TestSheet::default()),
    }))
}
