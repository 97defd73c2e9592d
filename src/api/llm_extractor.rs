//! An `Extractor` backed by an OpenAI-compatible chat-completions endpoint with vision input.

use crate::api::{parse_response, Extraction, Extractor};
use crate::model::{ImageInput, ALL_CATEGORIES};
use crate::{utils, Config, Result};
use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// The instructions sent with every image. `{categories}` and `{exclusions}` are filled in.
const PROMPT_TEMPLATE: &str = r#"You are a receipt data extraction assistant.
Look at the attached image and return ONLY a JSON object with this shape:
{
  "isValidReceipt": boolean,
  "validationError": "string, why the image is not a usable receipt, empty otherwise",
  "amount": number, the total paid including tax and tip,
  "date": "MM/DD/YYYY, or empty if no date is printed",
  "vendor": "string, the merchant name",
  "category": ["one or more of the allowed categories"],
  "paymentMethod": ["how it was paid, e.g. Card, Cash"],
  "excludeFromTable": boolean,
  "exclusionReason": "string, which exclusion rule matched, empty otherwise"
}

Allowed categories (use these labels exactly): {categories}

Never guess a date that is not printed on the receipt.

Exclusion rules (set excludeFromTable to true when one applies):
{exclusions}

Return ONLY the JSON object, no markdown fences, no commentary."#;

const NO_EXCLUSIONS: &str = "No exclusion criteria.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub(crate) struct LlmExtractor {
    client: Client,
    url: String,
    model: String,
    api_key: String,
    prompt: String,
}

impl LlmExtractor {
    pub(crate) async fn new(config: &Config) -> Result<Self> {
        let settings = config.extractor();
        let api_key = std::env::var(settings.api_key_env()).with_context(|| {
            format!(
                "The {} environment variable is required to call the extractor",
                settings.api_key_env()
            )
        })?;
        let exclusions = load_exclusion_criteria(config).await?;
        info!(
            url = %settings.base_url(),
            model = %settings.model(),
            "Using LLM extractor"
        );
        Ok(Self {
            client: Client::new(),
            url: format!("{}/chat/completions", settings.base_url().trim_end_matches('/')),
            model: settings.model().to_string(),
            api_key,
            prompt: build_prompt(&exclusions),
        })
    }
}

#[async_trait::async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&mut self, image: &ImageInput) -> Result<Extraction> {
        let data_url = format!(
            "data:{};base64,{}",
            image.kind().mime_type(),
            STANDARD.encode(image.bytes())
        );
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: json!([
                    { "type": "text", "text": self.prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]),
            }],
            temperature: 0.0,
        };

        debug!("Sending {} to the extractor", image.file_name());
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send the extraction request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("The extractor failed with status {status}: {body}");
        }

        let chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse the extractor response")?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("The extractor response has no content")?;
        parse_response(&content)
    }
}

/// Reads the optional exclusion criteria file from the home directory.
async fn load_exclusion_criteria(config: &Config) -> Result<String> {
    let path = config.exclusions_path();
    if !path.is_file() {
        return Ok(NO_EXCLUSIONS.to_string());
    }
    let text = utils::read(&path).await?;
    Ok(if text.trim().is_empty() {
        NO_EXCLUSIONS.to_string()
    } else {
        text
    })
}

fn build_prompt(exclusions: &str) -> String {
    let categories = ALL_CATEGORIES
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");
    PROMPT_TEMPLATE
        .replace("{categories}", &categories)
        .replace("{exclusions}", exclusions.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("Exclude parking receipts.\n");
        assert!(prompt.contains("Food & Restaurants, Groceries"));
        assert!(prompt.contains("Exclude parking receipts."));
        assert!(!prompt.contains("{categories}"));
        assert!(!prompt.contains("{exclusions}"));
    }
}
