//! Generative-content style backend (Gemini `generateContent`)

use serde::{Deserialize, Serialize};

use super::{non_empty, send_request, Provider, ProviderSettings};
use crate::Result;

/// Default Gemini API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Provider for `POST {base}/models/{model}:generateContent`.
#[derive(Debug)]
pub struct GenerativeProvider {
    model_id: String,
    api_key: String,
    endpoint: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    http_client: reqwest::Client,
}

impl GenerativeProvider {
    /// Create a provider against the Gemini API (or `settings.base_url`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if no API key is set or the HTTP client
    /// cannot be created.
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let api_key = settings.require_api_key("generative-content")?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            settings.base_url_or(GEMINI_BASE_URL),
            settings.model()
        );
        Ok(Self {
            model_id: format!("google/{}", settings.model()),
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

impl Provider for GenerativeProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    async fn send_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: system_prompt.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let response: GenerateResponse = send_request(
            self.http_client
                .post(&self.endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(&request),
        )
        .await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();
        non_empty(text)
    }
}
