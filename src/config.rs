//! Configuration file handling for receipt-ranger.
//!
//! The configuration file is stored at `$RECEIPT_RANGER_HOME/config.json`. It holds the
//! extractor settings, the number of date-recovery attempts, optional overrides for the input
//! and output directories and, when publishing is wanted, the Google Sheet to publish to.

use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "receipt-ranger";
const CONFIG_VERSION: u8 = 1;
const DATE_ATTEMPTS: u32 = 3;
const CONFIG_JSON: &str = "config.json";
const LEDGER_JSON: &str = "ledger.json";
const EXCLUSIONS_MD: &str = "exclusions.md";
const RECEIPTS: &str = "receipts";
const OUTPUT: &str = "output";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to the home directory and from there it loads `config.json`. It provides paths to
/// other items that are either configurable or are expected in a certain location within the
/// home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    sheets: Option<SheetsSettings>,
}

impl Config {
    /// Creates the home directory, its `receipts` and `output` subdirectories, and an initial
    /// `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the home directory, e.g. `$HOME/receipt-ranger`
    /// - `sheet_url` - When given, publishing is enabled for this Google Sheet.
    /// - `token_path` - Where the Google access token file is. Relative paths resolve against
    ///   the home directory. Ignored without `sheet_url`.
    ///
    /// # Errors
    /// - Returns an error if a config file already exists or if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        sheet_url: Option<&str>,
        token_path: Option<&Path>,
    ) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("A config file already exists at '{}'", config_path.display());
        }

        utils::make_dir(root.join(RECEIPTS)).await?;
        utils::make_dir(root.join(OUTPUT)).await?;

        let sheets = sheet_url.map(|url| SheetsFile {
            sheet_url: url.to_string(),
            token_path: token_path.map(Path::to_path_buf),
        });
        let config_file = ConfigFile {
            sheets,
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Self::from_parts(root, config_path, config_file)
    }

    /// This will
    /// - validate that the home directory and its config file exist
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The home directory is missing, run 'receipt-ranger init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        Self::from_parts(root, config_path, config_file)
    }

    fn from_parts(root: PathBuf, config_path: PathBuf, config_file: ConfigFile) -> Result<Self> {
        let sheets = match &config_file.sheets {
            Some(s) => Some(SheetsSettings::resolve(&root, s)?),
            None => None,
        };
        Ok(Self {
            root,
            config_path,
            config_file,
            sheets,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The local store.
    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(LEDGER_JSON)
    }

    /// Free-text rules given to the extractor for marking receipts as excluded.
    pub fn exclusions_path(&self) -> PathBuf {
        self.root.join(EXCLUSIONS_MD)
    }

    /// Where receipt images are read from when no directory is given on the command line.
    pub fn receipts_dir(&self) -> PathBuf {
        self.resolve(self.config_file.receipts_dir.as_deref(), RECEIPTS)
    }

    /// Where export files are written.
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(self.config_file.output_dir.as_deref(), OUTPUT)
    }

    /// The total number of extraction attempts made for an image while its date is missing.
    pub fn date_attempts(&self) -> u32 {
        self.config_file.date_attempts.max(1)
    }

    pub fn extractor(&self) -> &ExtractorSettings {
        &self.config_file.extractor
    }

    /// `None` when publishing is not configured.
    pub fn sheets(&self) -> Option<&SheetsSettings> {
        self.sheets.as_ref()
    }

    /// Returns `p` if it is absolute, `p` joined to the root if relative, or the root joined to
    /// `default` when `p` is `None`.
    fn resolve(&self, p: Option<&Path>, default: &str) -> PathBuf {
        match p {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.root.join(p),
            None => self.root.join(default),
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "receipt-ranger",
///   "config_version": 1,
///   "date_attempts": 3,
///   "extractor": {
///     "base_url": "https://api.openai.com/v1",
///     "model": "gpt-4o-mini",
///     "api_key_env": "OPENAI_API_KEY"
///   },
///   "sheets": {
///     "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///     "token_path": ".secrets/token.json"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "receipt-ranger"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Directory to read receipt images from. Defaults to `receipts` in the home directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    receipts_dir: Option<PathBuf>,

    /// Directory for export files. Defaults to `output` in the home directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,

    /// Total extraction attempts while the date is missing.
    #[serde(default = "default_date_attempts")]
    date_attempts: u32,

    #[serde(default)]
    extractor: ExtractorSettings,

    /// Publishing is disabled when this is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sheets: Option<SheetsFile>,
}

fn default_date_attempts() -> u32 {
    DATE_ATTEMPTS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            receipts_dir: None,
            output_dir: None,
            date_attempts: DATE_ATTEMPTS,
            extractor: ExtractorSettings::default(),
            sheets: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names another application.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Failed to load config file")?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

/// Settings for the OpenAI-compatible extraction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ExtractorSettings {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_model")]
    model: String,
    /// The name of the environment variable holding the API key. The key itself is never
    /// stored in the config file.
    #[serde(default = "default_api_key_env")]
    api_key_env: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl ExtractorSettings {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }
}

/// The `sheets` section as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct SheetsFile {
    /// URL of the Google Sheet to publish to.
    sheet_url: String,

    /// Path to a JSON file with an `access_token` field (relative to the home directory or
    /// absolute). Defaults to `.secrets/token.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

/// Resolved publishing settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SheetsSettings {
    sheet_url: String,
    spreadsheet_id: String,
    token_path: PathBuf,
}

impl SheetsSettings {
    fn resolve(root: &Path, file: &SheetsFile) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(&file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();
        let token_path = match &file.token_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(".secrets").join("token.json"),
        };
        Ok(Self {
            sheet_url: file.sheet_url.clone(),
            spreadsheet_id,
            token_path,
        })
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if id.is_empty() {
                break;
            }
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}
