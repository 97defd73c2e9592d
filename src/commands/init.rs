use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its `receipts` and `output` subdirectories and an initial
/// `config.json`.
///
/// # Arguments
/// - `home` - The directory that will be the home directory, e.g. `$HOME/receipt-ranger`
/// - `sheet_url` - The URL of the Google Sheet to publish to. Publishing stays disabled without
///   it.
/// - `token_path` - The file holding the Google access token.
///
/// # Errors
/// - Returns an error if the home directory is already initialized or any file operation fails.
pub async fn init(
    home: &Path,
    sheet_url: Option<&str>,
    token_path: Option<&Path>,
) -> Result<Out<()>> {
    let config = Config::create(home, sheet_url, token_path)
        .await
        .context("Unable to create the home directory and config")?;
    let publishing = match config.sheets() {
        Some(s) => format!("publishing to {}", s.sheet_url()),
        None => "publishing is disabled".to_string(),
    };
    Ok(format!(
        "Initialized {}; put receipt images in {}; {publishing}",
        config.root().display(),
        config.receipts_dir().display()
    )
    .into())
}
