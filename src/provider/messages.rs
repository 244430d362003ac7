//! Message style backend (Anthropic messages API)

use serde::{Deserialize, Serialize};

use super::{non_empty, send_request, Provider, ProviderSettings};
use crate::Result;

/// Default Anthropic API base URL.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The messages API requires an explicit token limit.
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Provider for `POST {base}/messages`.
#[derive(Debug)]
pub struct MessagesProvider {
    model_id: String,
    model: String,
    api_key: String,
    endpoint: String,
    temperature: Option<f64>,
    max_tokens: u32,
    http_client: reqwest::Client,
}

impl MessagesProvider {
    /// Create a provider against the Anthropic API (or `settings.base_url`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no API key is set or the HTTP client
    /// cannot be created.
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let api_key = settings.require_api_key("messages")?;
        Ok(Self {
            model_id: format!("anthropic/{}", settings.model()),
            model: settings.model().to_string(),
            api_key,
            endpoint: format!("{}/messages", settings.base_url_or(ANTHROPIC_BASE_URL)),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            http_client: settings.http_client()?,
        })
    }
}

impl Provider for MessagesProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    async fn send_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_prompt,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response: MessagesResponse = send_request(
            self.http_client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request),
        )
        .await?;

        let text = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect::<String>();
        non_empty(text)
    }
}
