//! Typed errors for the LLM transport clients.

use thiserror::Error;

/// Errors produced by the Gemini/OpenAI clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP request itself failed (connect, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be parsed.
    #[error("response parse error: {0}")]
    Parse(String),

    /// The response contained no usable candidate.
    #[error("empty response from provider")]
    EmptyResponse,
}

impl ClientError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            ClientError::Parse(_) | ClientError::EmptyResponse => false,
        }
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
