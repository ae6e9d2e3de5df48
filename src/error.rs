//! Error types for the tutor client.

use thiserror::Error;

/// Client error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The backend could not be reached (connect failure, timeout, reset).
    #[error("backend unavailable at {endpoint}: {source}")]
    NetworkUnavailable {
        /// Full URL of the request that failed.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("backend error ({status}): {body}")]
    BackendHttp {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// Nothing to send.
    #[error("input text is empty")]
    EmptyInput,

    /// Invalid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local state could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BackendHttp { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// A short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnavailable { .. } => {
                "Could not connect to the tutor backend. Is it running?".to_string()
            }
            Self::BackendHttp { status, .. } => {
                format!("The tutor backend returned an error ({status}).")
            }
            Self::EmptyInput => "Select some code or type a question first.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
