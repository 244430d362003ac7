//! Provider abstraction over heterogeneous model backends
//!
//! Callers depend only on the [`Provider`] trait: `send_text` for plain
//! completions and `send_json` for structured answers. Backends:
//!
//! - [`ChatCompletionsProvider`] - chat-completion style APIs (OpenAI, OpenRouter)
//! - [`GenerativeProvider`] - generative-content style APIs (Gemini)
//! - [`MessagesProvider`] - message style APIs (Anthropic)
//! - [`CommandProvider`] - a local CLI that reads the prompt on stdin
//!
//! [`AnyProvider`] is the tagged union the configuration layer hands out.
//! Providers are constructed explicitly and scoped to one campaign; there is
//! no process-wide client or credential state.
//!
//! # Example
//!
//! ```rust,no_run
//! use anchorlab::provider::{ChatCompletionsProvider, Provider, ProviderSettings};
//!
//! # async fn example() -> anchorlab::Result<()> {
//! let provider = ChatCompletionsProvider::new(
//!     ProviderSettings::new("gpt-4o").api_key("sk-...").temperature(0.7),
//! )?;
//! let answer = provider.send_text("How many months?", Some("You are a judge.")).await?;
//! let structured = provider
//!     .send_json::<serde_json::Value>("Answer as JSON", None, None)
//!     .await?;
//! println!("{answer} / pure json: {}", structured.is_pure_json);
//! # Ok(())
//! # }
//! ```

mod chat_completions;
mod command;
mod generative;
mod messages;

pub use chat_completions::ChatCompletionsProvider;
pub use command::CommandProvider;
pub use generative::GenerativeProvider;
pub use messages::MessagesProvider;

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, Result};

/// Default per-call transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Structured answer returned by [`Provider::send_json`].
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse<T> {
    /// Deserialized value.
    pub parsed: T,
    /// Full raw response text.
    pub raw_response: String,
    /// Whether the raw response (trimmed) was exactly the JSON object.
    pub is_pure_json: bool,
}

/// Uniform capability interface over model backends.
///
/// Model identity and sampling temperature are fixed when the provider is
/// constructed.
pub trait Provider: Send + Sync {
    /// Model identifier recorded with every trial.
    fn model_id(&self) -> &str;

    /// Sampling temperature, if one was configured.
    fn temperature(&self) -> Option<f64> {
        None
    }

    /// Send a prompt and return the response text.
    fn send_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Send a prompt and extract exactly one JSON object from the response.
    ///
    /// The optional schema is appended to the prompt as an instruction. The
    /// JSON object is located by scanning from the first `{` to the last `}`.
    ///
    /// # Errors
    ///
    /// Transport errors propagate; `Error::JsonNotFound` / `Error::InvalidJson`
    /// when no valid object is present; `Error::SchemaMismatch` when the object
    /// does not have the shape of `T`.
    fn send_json<T: DeserializeOwned + Send>(
        &self,
        prompt: &str,
        schema: Option<&Value>,
        system_prompt: Option<&str>,
    ) -> impl Future<Output = Result<JsonResponse<T>>> + Send {
        async move {
            let prompt = with_schema_hint(prompt, schema);
            let raw = self.send_text(&prompt, system_prompt).await?;
            decode_json_response(raw)
        }
    }
}

/// A JSON object located inside free-form text.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonExtraction {
    /// Parsed object.
    pub value: Value,
    /// Whether the object spans the whole (trimmed) text.
    pub is_pure_json: bool,
}

/// Locate the single JSON object in `raw` (first `{` to last `}`).
///
/// # Errors
///
/// `Error::JsonNotFound` if there is no `{...}` span, `Error::InvalidJson` if
/// the span does not parse.
///
/// # Examples
///
/// ```rust
/// use anchorlab::provider::extract_json;
///
/// let pure = extract_json("  {\"a\": 1}\n").unwrap();
/// assert!(pure.is_pure_json);
///
/// let wrapped = extract_json("Sure! {\"a\": 1} Hope that helps.").unwrap();
/// assert!(!wrapped.is_pure_json);
/// assert_eq!(wrapped.value["a"], 1);
/// ```
pub fn extract_json(raw: &str) -> Result<JsonExtraction> {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(Error::JsonNotFound);
    };
    if end < start {
        return Err(Error::JsonNotFound);
    }
    let span = &raw[start..=end];
    let value: Value =
        serde_json::from_str(span).map_err(|e| Error::InvalidJson(e.to_string()))?;
    Ok(JsonExtraction {
        value,
        is_pure_json: span == raw.trim(),
    })
}

/// Decode a raw response into a typed [`JsonResponse`].
///
/// # Errors
///
/// As [`extract_json`], plus `Error::SchemaMismatch` when the object does
/// not deserialize into `T`.
pub fn decode_json_response<T: DeserializeOwned>(raw: String) -> Result<JsonResponse<T>> {
    let extraction = extract_json(&raw)?;
    let parsed = serde_json::from_value(extraction.value).map_err(|e| schema_mismatch(&e))?;
    Ok(JsonResponse {
        parsed,
        raw_response: raw,
        is_pure_json: extraction.is_pure_json,
    })
}

fn schema_mismatch(err: &serde_json::Error) -> Error {
    let message = err.to_string();
    let field = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
        .map_or(message.clone(), str::to_string);
    Error::SchemaMismatch { field }
}

fn with_schema_hint(prompt: &str, schema: Option<&Value>) -> String {
    match schema {
        Some(schema) => format!(
            "{prompt}\n\nRespond with a single JSON object matching this schema:\n{schema}"
        ),
        None => prompt.to_string(),
    }
}

/// Shared construction settings for the HTTP backends.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl ProviderSettings {
    /// Settings for the given backend model name.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the backend base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the completion token limit.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the per-call transport timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the backend model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn require_api_key(&self, backend: &str) -> Result<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Configuration(format!("{backend} backend requires an API key")))
    }

    fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {e}")))
    }
}

/// Send a prepared request and decode a JSON body, mapping non-success
/// statuses to `Error::Http`.
async fn send_request<R: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<R> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<R>().await?)
}

fn non_empty(text: String) -> Result<String> {
    if text.trim().is_empty() {
        Err(Error::Transport("backend returned an empty completion".to_string()))
    } else {
        Ok(text)
    }
}

/// Tagged union of all backends.
#[derive(Debug)]
pub enum AnyProvider {
    /// Chat-completion style backend.
    ChatCompletions(ChatCompletionsProvider),
    /// Generative-content style backend.
    Generative(GenerativeProvider),
    /// Message style backend.
    Messages(MessagesProvider),
    /// Local command-execution backend.
    Command(CommandProvider),
}

impl Provider for AnyProvider {
    fn model_id(&self) -> &str {
        match self {
            Self::ChatCompletions(p) => p.model_id(),
            Self::Generative(p) => p.model_id(),
            Self::Messages(p) => p.model_id(),
            Self::Command(p) => p.model_id(),
        }
    }

    fn temperature(&self) -> Option<f64> {
        match self {
            Self::ChatCompletions(p) => p.temperature(),
            Self::Generative(p) => p.temperature(),
            Self::Messages(p) => p.temperature(),
            Self::Command(p) => p.temperature(),
        }
    }

    async fn send_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        match self {
            Self::ChatCompletions(p) => p.send_text(prompt, system_prompt).await,
            Self::Generative(p) => p.send_text(prompt, system_prompt).await,
            Self::Messages(p) => p.send_text(prompt, system_prompt).await,
            Self::Command(p) => p.send_text(prompt, system_prompt).await,
        }
    }
}
