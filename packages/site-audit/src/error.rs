//! Typed errors for the audit engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Collector and audit failures
//! are *not* errors — they are carried as data in `CollectorOutput` and
//! `explicit_gaps`. `AuditError` covers the cases where a run cannot start
//! or cannot continue.

use thiserror::Error;

/// Stable error codes surfaced to callers and event consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidUrl,
    FetchFailed,
    Timeout,
    RateLimited,
    ApiError,
    ParseError,
    CorsError,
    NetworkError,
    ScreenshotFailed,
}

impl ErrorCode {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::Timeout
                | ErrorCode::RateLimited
                | ErrorCode::NetworkError
                | ErrorCode::FetchFailed
                | ErrorCode::ScreenshotFailed
        )
    }

    /// The wire name of the code, e.g. `INVALID_URL`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::FetchFailed => "FETCH_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::CorsError => "CORS_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ScreenshotFailed => "SCREENSHOT_FAILED",
        }
    }
}

/// Errors that abort an audit run (or prevent it from starting).
#[derive(Debug, Error)]
pub enum AuditError {
    /// The target URL failed validation at the entry point.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// A provider the caller demanded is not configured.
    #[error("provider not configured: {provider}")]
    ProviderNotConfigured { provider: String },

    /// Both primary and fallback providers failed for a required call.
    #[error("all providers exhausted: {0}")]
    ProvidersExhausted(String),

    /// Cache backend failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// The run was cancelled by the caller.
    #[error("audit cancelled")]
    Cancelled,

    /// A trapped panic from a layer task (programming fault).
    #[error("internal fault: {0}")]
    Internal(String),

    /// JSON (de)serialization failure on a cached artifact.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuditError {
    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            AuditError::InvalidUrl { .. } => ErrorCode::InvalidUrl,
            AuditError::ProviderNotConfigured { .. } => ErrorCode::ApiError,
            AuditError::ProvidersExhausted(_) => ErrorCode::ApiError,
            AuditError::Cache(_) => ErrorCode::ParseError,
            AuditError::Cancelled => ErrorCode::NetworkError,
            AuditError::Internal(_) => ErrorCode::ApiError,
            AuditError::Json(_) => ErrorCode::ParseError,
        }
    }
}

/// URL validation errors raised before any socket is opened.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, internal IPs)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors from the provider registry (LLM transport level).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The underlying client failed.
    #[error("provider call failed: {0}")]
    Call(String),

    /// The call did not finish within its deadline.
    #[error("provider call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The response was not the JSON envelope we asked for.
    #[error("provider response parse error: {0}")]
    Parse(String),

    /// No adapter is registered under this name.
    #[error("unknown provider: {0}")]
    Unknown(String),
}

impl ProviderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProviderError::Call(_) => ErrorCode::ApiError,
            ProviderError::Timeout { .. } => ErrorCode::Timeout,
            ProviderError::Parse(_) => ErrorCode::ParseError,
            ProviderError::Unknown(_) => ErrorCode::ApiError,
        }
    }
}

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for security validation.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_names() {
        assert_eq!(ErrorCode::InvalidUrl.as_str(), "INVALID_URL");
        assert_eq!(ErrorCode::ScreenshotFailed.as_str(), "SCREENSHOT_FAILED");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ErrorCode::Timeout.retryable());
        assert!(ErrorCode::RateLimited.retryable());
        assert!(!ErrorCode::InvalidUrl.retryable());
        assert!(!ErrorCode::ParseError.retryable());
    }

    #[test]
    fn test_audit_error_codes() {
        let err = AuditError::InvalidUrl {
            url: "not a url".into(),
        };
        assert_eq!(err.code(), ErrorCode::InvalidUrl);
        assert!(!err.code().retryable());
    }
}
