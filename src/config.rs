//! Provider configuration
//!
//! Model identifiers take the form `<backend>/<model>`:
//!
//! | Prefix | Backend | Credential |
//! |---|---|---|
//! | `openai/` | chat completions | `OPENAI_API_KEY` |
//! | `openrouter/` | chat completions (OpenRouter) | `OPENROUTER_API_KEY` |
//! | `anthropic/` | messages | `ANTHROPIC_API_KEY` |
//! | `google/` | generative content | `GEMINI_API_KEY` |
//! | `cli/` | local command | none |
//!
//! Every configuration problem surfaces as `Error::Configuration` before a
//! single trial runs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::provider::{
    AnyProvider, ChatCompletionsProvider, CommandProvider, GenerativeProvider, MessagesProvider,
    ProviderSettings, DEFAULT_TIMEOUT,
};
use crate::{Error, Result};

/// OpenRouter API base URL.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Backend family named by a model identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `openai/`
    OpenAi,
    /// `openrouter/`
    OpenRouter,
    /// `anthropic/`
    Anthropic,
    /// `google/`
    Google,
    /// `cli/`
    Cli,
}

impl BackendKind {
    /// Identifier prefix.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Cli => "cli",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    #[must_use]
    pub const fn api_key_var(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Google => Some("GEMINI_API_KEY"),
            Self::Cli => None,
        }
    }
}

/// A parsed `<backend>/<model>` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    backend: BackendKind,
    model: String,
}

impl ModelSpec {
    /// Get the backend family.
    #[must_use]
    pub const fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Get the backend-local model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl FromStr for ModelSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, model) = s.trim().split_once('/').ok_or_else(|| {
            Error::Configuration(format!(
                "model identifier `{s}` must look like `<backend>/<model>`"
            ))
        })?;
        let backend = match prefix {
            "openai" => BackendKind::OpenAi,
            "openrouter" => BackendKind::OpenRouter,
            "anthropic" => BackendKind::Anthropic,
            "google" | "gemini" => BackendKind::Google,
            "cli" => BackendKind::Cli,
            other => {
                return Err(Error::Configuration(format!(
                    "unknown backend `{other}` in model identifier `{s}`"
                )))
            }
        };
        if model.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "model identifier `{s}` has an empty model name"
            )));
        }
        Ok(Self {
            backend,
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.backend.prefix(), self.model)
    }
}

/// Everything needed to construct one provider for one campaign.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    spec: ModelSpec,
    api_key: Option<String>,
    base_url: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout: Duration,
    command_args: Vec<String>,
}

impl ProviderConfig {
    /// Configuration without credentials.
    #[must_use]
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
            command_args: Vec::new(),
        }
    }

    /// Parse a model identifier and read its credential from the environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an unknown identifier or a missing
    /// API key variable.
    pub fn from_env(model_id: &str) -> Result<Self> {
        Self::from_lookup(model_id, |var| std::env::var(var).ok())
    }

    /// As [`ProviderConfig::from_env`] with an injectable variable lookup.
    ///
    /// # Errors
    ///
    /// As [`ProviderConfig::from_env`].
    pub fn from_lookup<F>(model_id: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let spec: ModelSpec = model_id.parse()?;
        let mut config = Self::new(spec);
        if let Some(var) = config.spec.backend().api_key_var() {
            let key = lookup(var).filter(|k| !k.trim().is_empty()).ok_or_else(|| {
                Error::Configuration(format!("`{var}` is not set (needed for `{model_id}`)"))
            })?;
            config.api_key = Some(key);
        }
        Ok(config)
    }

    /// Set the API key explicitly.
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

    /// Append an argument for `cli/` backends.
    #[must_use]
    pub fn command_arg(mut self, arg: impl Into<String>) -> Self {
        self.command_args.push(arg.into());
        self
    }

    /// Get the parsed model spec.
    #[must_use]
    pub const fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Construct the provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if credentials are missing or the HTTP
    /// client cannot be built.
    pub fn build(self) -> Result<AnyProvider> {
        let model_id = self.spec.to_string();
        let mut settings = ProviderSettings::new(self.spec.model()).timeout(self.timeout);
        if let Some(key) = self.api_key {
            settings = settings.api_key(key);
        }
        if let Some(temperature) = self.temperature {
            settings = settings.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            settings = settings.max_tokens(max_tokens);
        }
        let base_url = match (self.base_url, self.spec.backend()) {
            (Some(url), _) => Some(url),
            (None, BackendKind::OpenRouter) => Some(OPENROUTER_BASE_URL.to_string()),
            (None, _) => None,
        };
        if let Some(url) = base_url {
            settings = settings.base_url(url);
        }

        Ok(match self.spec.backend() {
            BackendKind::OpenAi | BackendKind::OpenRouter => AnyProvider::ChatCompletions(
                ChatCompletionsProvider::with_model_id(settings, model_id)?,
            ),
            BackendKind::Anthropic => AnyProvider::Messages(MessagesProvider::new(settings)?),
            BackendKind::Google => AnyProvider::Generative(GenerativeProvider::new(settings)?),
            BackendKind::Cli => AnyProvider::Command(
                self.command_args
                    .into_iter()
                    .fold(CommandProvider::new(self.spec.model()), CommandProvider::arg)
                    .timeout(self.timeout),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;

    #[test]
    fn test_parse_model_spec() {
        let spec: ModelSpec = "openrouter/meta-llama/llama-3.1-70b".parse().unwrap();
        assert_eq!(spec.backend(), BackendKind::OpenRouter);
        assert_eq!(spec.model(), "meta-llama/llama-3.1-70b");
        assert_eq!(spec.to_string(), "openrouter/meta-llama/llama-3.1-70b");
    }

    #[test]
    fn test_bad_identifiers_are_configuration_errors() {
        for id in ["gpt-4o", "acme/model", "openai/", ""] {
            let err = id.parse::<ModelSpec>().unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{id}");
        }
    }

    #[test]
    fn test_missing_credentials_fail_before_build() {
        let err = ProviderConfig::from_lookup("anthropic/claude-3-5-sonnet", |_| None).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_cli_needs_no_credentials() {
        let provider = ProviderConfig::from_lookup("cli/cat", |_| None)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(provider.model_id(), "cli/cat");
    }

    #[test]
    fn test_openrouter_builds_chat_completions() {
        let provider = ProviderConfig::from_lookup("openrouter/mistralai/mistral-large", |var| {
            (var == "OPENROUTER_API_KEY").then(|| "key".to_string())
        })
        .unwrap()
        .temperature(0.7)
        .build()
        .unwrap();
        assert!(matches!(provider, AnyProvider::ChatCompletions(_)));
        assert_eq!(provider.model_id(), "openrouter/mistralai/mistral-large");
        assert_eq!(provider.temperature(), Some(0.7));
    }

    #[test]
    fn test_recorded_model_id_is_normalised() {
        let provider = ProviderConfig::from_lookup("  gemini/gemini-1.5-pro ", |var| {
            (var == "GEMINI_API_KEY").then(|| "key".to_string())
        })
        .unwrap()
        .build()
        .unwrap();
        assert_eq!(provider.model_id(), "google/gemini-1.5-pro");
    }
}
