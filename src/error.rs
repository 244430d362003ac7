//! Error types for anchorlab
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Errors fall into two classes. Trial-scoped errors (transport failures,
//! unparseable responses) are contained by the scheduler and written to the
//! sink as error records. Everything else aborts the campaign.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// anchorlab error types
#[derive(Error, Debug)]
pub enum Error {
    /// Network or backend failure while calling a model
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success HTTP status
    #[error("Backend returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body (truncated by the caller if large)
        body: String,
    },

    /// Response contained no `{...}` span at all
    #[error("No JSON object found in response")]
    JsonNotFound,

    /// A `{...}` span was found but is not valid JSON
    #[error("Invalid JSON in response: {0}")]
    InvalidJson(String),

    /// No extraction rule matched the response text
    #[error("Parse error: {0}")]
    Parse(String),

    /// Structure present but the expected field is missing
    #[error("Schema mismatch: expected field `{field}` is missing")]
    SchemaMismatch {
        /// Name of the missing field
        field: String,
    },

    /// Bad model identifier or missing credentials (fatal, checked before any trial)
    #[error("Configuration error: {0}\nCheck the model identifier and the provider API key environment variables")]
    Configuration(String),

    /// Invalid input to a library function
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is contained at the per-trial boundary.
    ///
    /// Trial-scoped errors are recorded in the sink and the campaign moves on;
    /// all other errors propagate to the caller and halt the campaign.
    #[must_use]
    pub const fn is_trial_scoped(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Http { .. }
                | Self::JsonNotFound
                | Self::InvalidJson(_)
                | Self::Parse(_)
                | Self::SchemaMismatch { .. }
        )
    }

    /// Stable short label persisted in error records.
    ///
    /// Schema mismatches and JSON location failures are recorded as `parse`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) | Self::Http { .. } => "transport",
            Self::JsonNotFound | Self::InvalidJson(_) | Self::Parse(_) | Self::SchemaMismatch { .. } => {
                "parse"
            }
            Self::Configuration(_) => "configuration",
            Self::InvalidInput(_) => "invalid_input",
            Self::Io(_) => "io",
            Self::Serde(_) => "serde",
            Self::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
