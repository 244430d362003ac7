//! Chat-completion style backend (OpenAI, OpenRouter and compatible servers)

use serde::{Deserialize, Serialize};

use super::{non_empty, send_request, Provider, ProviderSettings};
use crate::Result;

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// MARK: - Wire types

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// MARK: - Provider

/// Provider for `POST {base}/chat/completions` APIs with bearer auth.
#[derive(Debug)]
pub struct ChatCompletionsProvider {
    model_id: String,
    model: String,
    api_key: String,
    endpoint: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    http_client: reqwest::Client,
}

impl ChatCompletionsProvider {
    /// Create a provider against the OpenAI API (or `settings.base_url`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no API key is set or the HTTP client
    /// cannot be created.
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let model_id = format!("openai/{}", settings.model());
        Self::with_model_id(settings, model_id)
    }

    /// Create a provider that records trials under an explicit model ID
    /// (e.g. `openrouter/meta-llama/llama-3.1-70b`).
    ///
    /// # Errors
    ///
    /// As [`ChatCompletionsProvider::new`].
    pub fn with_model_id(settings: ProviderSettings, model_id: impl Into<String>) -> Result<Self> {
        let api_key = settings.require_api_key("chat-completions")?;
        let endpoint = format!("{}/chat/completions", settings.base_url_or(OPENAI_BASE_URL));
        Ok(Self {
            model_id: model_id.into(),
            model: settings.model().to_string(),
            api_key,
            endpoint,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            http_client: settings.http_client()?,
        })
    }

    /// Get the request endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Provider for ChatCompletionsProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    async fn send_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response: CompletionResponse = send_request(
            self.http_client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request),
        )
        .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        non_empty(text)
    }
}
