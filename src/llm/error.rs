//! Generation error types with retry classification.
//!
//! Distinguishes transient errors (retried by the rate limiter) from
//! permanent errors (propagated to the caller without retry).

use std::time::Duration;

/// Error from a text-generation backend call.
#[derive(Debug, Clone)]
pub struct GenerateError {
    /// The kind of error
    pub kind: GenerateErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
    /// Suggested retry delay (from a Retry-After header, when the backend sent one)
    pub retry_after: Option<Duration>,
}

impl GenerateError {
    /// Create a rate limit error.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: GenerateErrorKind::RateLimited,
            status_code: Some(429),
            message: message.into(),
            retry_after,
        }
    }

    /// Create a server error.
    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: GenerateErrorKind::ServerError,
            status_code: Some(status_code),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a network error.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            kind: GenerateErrorKind::NetworkError,
            status_code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create an authorization error (401/403). Never retried, never falls
    /// back to another model: the credential is the problem.
    pub fn auth_rejected(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: GenerateErrorKind::AuthRejected,
            status_code: Some(status_code),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a model-not-found error. Triggers candidate fallback during
    /// initialization probing.
    pub fn model_not_found(message: impl Into<String>) -> Self {
        Self {
            kind: GenerateErrorKind::ModelNotFound,
            status_code: Some(404),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create an invalid-request error (malformed prompt/options).
    pub fn invalid_request(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: GenerateErrorKind::InvalidRequest,
            status_code: Some(status_code),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a response parse error.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            kind: GenerateErrorKind::ParseError,
            status_code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Check if this error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Classification of generation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateErrorKind {
    /// Rate limited (429) - transient, retried with backoff
    RateLimited,
    /// Server error (500, 502, 503, 504) - transient, retried
    ServerError,
    /// Network error (connection failed, timeout) - transient, retried
    NetworkError,
    /// Authorization failure (401, 403) - fatal, aborts initialization
    AuthRejected,
    /// Unknown model (404) - advances to the next candidate during probing
    ModelNotFound,
    /// Malformed request (other 4xx) - permanent, not retried
    InvalidRequest,
    /// Response parsing error - permanent
    ParseError,
}

impl GenerateErrorKind {
    /// Check if this error kind is transient (retry with the same model).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerateErrorKind::RateLimited
                | GenerateErrorKind::ServerError
                | GenerateErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for GenerateErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateErrorKind::RateLimited => write!(f, "Rate limited"),
            GenerateErrorKind::ServerError => write!(f, "Server error"),
            GenerateErrorKind::NetworkError => write!(f, "Network error"),
            GenerateErrorKind::AuthRejected => write!(f, "Authorization rejected"),
            GenerateErrorKind::ModelNotFound => write!(f, "Model not found"),
            GenerateErrorKind::InvalidRequest => write!(f, "Invalid request"),
            GenerateErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Map an HTTP status code onto an error kind.
pub fn classify_http_status(status: u16) -> GenerateErrorKind {
    match status {
        429 => GenerateErrorKind::RateLimited,
        500 | 502 | 503 | 504 => GenerateErrorKind::ServerError,
        401 | 403 => GenerateErrorKind::AuthRejected,
        404 => GenerateErrorKind::ModelNotFound,
        400..=499 => GenerateErrorKind::InvalidRequest,
        _ => GenerateErrorKind::ServerError,
    }
}

/// Build a `GenerateError` from an HTTP response status and body.
pub fn error_from_status(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> GenerateError {
    match classify_http_status(status) {
        GenerateErrorKind::RateLimited => GenerateError::rate_limited(body, retry_after),
        GenerateErrorKind::ServerError => GenerateError::server_error(status, body),
        GenerateErrorKind::AuthRejected => GenerateError::auth_rejected(status, body),
        GenerateErrorKind::ModelNotFound => GenerateError::model_not_found(body),
        GenerateErrorKind::InvalidRequest => GenerateError::invalid_request(status, body),
        _ => GenerateError::server_error(status, body),
    }
}
