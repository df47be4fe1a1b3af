//! Custom error types for citadel

use thiserror::Error;

/// Main error type for citadel operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing field '{field}' in {kind} payload")]
    MissingField { kind: String, field: String },

    #[error("Related {kind} fetch failed for {url}: {reason}")]
    RelatedFetchFailed {
        kind: String,
        url: String,
        reason: String,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: String, id: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn missing_field(kind: impl ToString, field: &str) -> Self {
        Error::MissingField {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }

    /// Fatal errors abort the current reconciliation; everything else is
    /// logged and processing continues at the narrowest scope.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingField { .. } | Error::Database(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for citadel
pub type Result<T> = std::result::Result<T, Error>;
