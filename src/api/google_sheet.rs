//! Implements the `Publisher` trait against the Google Sheets v4 REST API.

use crate::api::{Publisher, SheetHandle};
use crate::config::SheetsSettings;
use crate::render::COLUMN_COUNT;
use crate::{utils, Result};
use anyhow::{anyhow, bail, Context};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::trace;
use url::Url;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// The part of the token file that is needed to call the API.
#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: Option<i64>,
    title: String,
}

#[derive(Debug, Deserialize)]
struct BatchUpdateResponse {
    #[serde(default)]
    replies: Vec<BatchUpdateReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateReply {
    #[serde(default)]
    add_sheet: Option<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// The text of an unformatted cell. Numbers (date serials included) keep their plain digits.
fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Talks to one spreadsheet with a bearer access token.
pub(crate) struct GoogleSheet {
    client: Client,
    spreadsheet_id: String,
    access_token: String,
}

impl GoogleSheet {
    pub(crate) async fn new(settings: &SheetsSettings) -> Result<Self> {
        let access_token = load_access_token(settings.token_path()).await?;
        Ok(Self {
            client: Client::new(),
            spreadsheet_id: settings.spreadsheet_id().to_string(),
            access_token,
        })
    }

    /// Builds `https://sheets.googleapis.com/v4/spreadsheets/{id}/{segments...}` with each
    /// segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API).context("Invalid Sheets API base URL")?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("The Sheets API URL cannot have path segments"))?;
            path.push(&self.spreadsheet_id);
            for s in segments {
                path.push(s);
            }
        }
        Ok(url)
    }

    fn with_id_suffix(&self, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API).context("Invalid Sheets API base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("The Sheets API URL cannot have path segments"))?
            .push(&format!("{}{suffix}", self.spreadsheet_id));
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Publisher for GoogleSheet {
    async fn find_sheet(&mut self, title: &str) -> Result<Option<SheetHandle>> {
        trace!("find_sheet for {title}");
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let meta: SpreadsheetMeta = send_json(
            self.client.get(url).bearer_auth(&self.access_token),
            "read the spreadsheet's tabs",
        )
        .await?;
        Ok(meta
            .sheets
            .into_iter()
            .find(|s| s.properties.title == title)
            .map(|s| SheetHandle::new(s.properties.title, s.properties.sheet_id, false)))
    }

    async fn create_sheet(&mut self, title: &str) -> Result<SheetHandle> {
        trace!("create_sheet for {title}");
        let url = self.with_id_suffix(":batchUpdate")?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        let response: BatchUpdateResponse = send_json(
            self.client
                .post(url)
                .bearer_auth(&self.access_token)
                .json(&body),
            &format!("create the '{title}' tab"),
        )
        .await?;
        let sheet_id = response
            .replies
            .into_iter()
            .find_map(|r| r.add_sheet)
            .and_then(|s| s.properties.sheet_id);
        Ok(SheetHandle::new(title, sheet_id, true))
    }

    async fn read_rows(&mut self, sheet: &SheetHandle) -> Result<Vec<Vec<String>>> {
        trace!("read_rows for {}", sheet.title());
        let mut url = self.url(&["values", &a1_range(sheet.title())])?;
        // Unformatted values keep row keys independent of the spreadsheet's locale.
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("dateTimeRenderOption", "SERIAL_NUMBER");
        let range: ValueRange = send_json(
            self.client.get(url).bearer_auth(&self.access_token),
            &format!("read the '{}' tab", sheet.title()),
        )
        .await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn append_row(&mut self, sheet: &SheetHandle, row: &[String]) -> Result<()> {
        trace!("append_row for {}", sheet.title());
        let mut url = self.url(&["values", &format!("{}:append", a1_range(sheet.title()))])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let _: serde_json::Value = send_json(
            self.client
                .post(url)
                .bearer_auth(&self.access_token)
                .json(&json!({ "values": [row] })),
            &format!("append a row to the '{}' tab", sheet.title()),
        )
        .await?;
        Ok(())
    }
}

/// The A1 range covering the table columns of a tab, e.g. `'January 2026'!A:E`.
fn a1_range(title: &str) -> String {
    let last = char::from(b'A' + (COLUMN_COUNT as u8) - 1);
    format!("'{}'!A:{last}", title.replace('\'', "''"))
}

/// Sends `request` and parses a JSON body, turning non-success statuses into errors.
async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to reach Google Sheets to {what}"))?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        bail!("Google Sheets failed to {what} with status {status}: {body}");
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse the Google Sheets response to {what}"))
}

async fn load_access_token(path: &Path) -> Result<String> {
    let token: TokenFile = utils::deserialize(path)
        .await
        .context("Unable to load the Google Sheets token file")?;
    if token.access_token.trim().is_empty() {
        bail!("The token file at {} has an empty access_token", path.display());
    }
    Ok(token.access_token)
}
