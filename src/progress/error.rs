//! Submission error types with HTTP-status classification.
//!
//! Every failure is surfaced to the player; nothing here retries on its own.

use std::time::Duration;

/// Error from a completion or marker upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitError {
    /// The kind of error
    pub kind: SubmitErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl SubmitError {
    /// No access token on the session.
    pub fn unauthenticated() -> Self {
        Self {
            kind: SubmitErrorKind::Unauthenticated,
            status_code: None,
            message: "No access token found. Please log in again.".to_string(),
        }
    }

    /// Create an error from a non-2xx response.
    pub fn from_status(status_code: u16, body: &str) -> Self {
        Self {
            kind: classify_http_status(status_code),
            status_code: Some(status_code),
            message: body_excerpt(body),
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: SubmitErrorKind::Network,
            status_code: None,
            message,
        }
    }

    /// Create a timeout error.
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: SubmitErrorKind::Timeout,
            status_code: None,
            message: format!("Request timed out ({}s). Check network or server.", after.as_secs()),
        }
    }

    /// Create a configuration error (bad endpoint, oversized payload).
    pub fn invalid_request(message: String) -> Self {
        Self {
            kind: SubmitErrorKind::InvalidRequest,
            status_code: None,
            message,
        }
    }

    /// Whether resubmitting the same evidence can succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            SubmitError::timeout(timeout)
        } else if err.is_connect() {
            SubmitError::network_error(format!("Connection failed: {}", err))
        } else {
            SubmitError::network_error(format!("Request failed: {}", err))
        }
    }
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Classification of submission errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitErrorKind {
    /// Session has no token, or the server rejected it (401/403)
    Unauthenticated,
    /// Connection failed before a response arrived
    Network,
    /// No response within the request timeout
    Timeout,
    /// 5xx or 429
    Server,
    /// Other 4xx
    Client,
    /// The request could not be built
    InvalidRequest,
}

impl SubmitErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubmitErrorKind::Network | SubmitErrorKind::Timeout | SubmitErrorKind::Server
        )
    }
}

impl std::fmt::Display for SubmitErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitErrorKind::Unauthenticated => write!(f, "Authentication error"),
            SubmitErrorKind::Network => write!(f, "Network error"),
            SubmitErrorKind::Timeout => write!(f, "Timeout"),
            SubmitErrorKind::Server => write!(f, "Server error"),
            SubmitErrorKind::Client => write!(f, "Request rejected"),
            SubmitErrorKind::InvalidRequest => write!(f, "Invalid request"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> SubmitErrorKind {
    match status {
        401 | 403 => SubmitErrorKind::Unauthenticated,
        429 => SubmitErrorKind::Server,
        400..=499 => SubmitErrorKind::Client,
        _ => SubmitErrorKind::Server,
    }
}

fn body_excerpt(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(500), SubmitErrorKind::Server);
        assert_eq!(classify_http_status(503), SubmitErrorKind::Server);
        assert_eq!(classify_http_status(429), SubmitErrorKind::Server);
        assert_eq!(classify_http_status(401), SubmitErrorKind::Unauthenticated);
        assert_eq!(classify_http_status(403), SubmitErrorKind::Unauthenticated);
        assert_eq!(classify_http_status(400), SubmitErrorKind::Client);
        assert_eq!(classify_http_status(404), SubmitErrorKind::Client);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SubmitError::from_status(500, "boom").is_retryable());
        assert!(SubmitError::network_error("down".to_string()).is_retryable());
        assert!(SubmitError::timeout(Duration::from_secs(60)).is_retryable());
        assert!(!SubmitError::from_status(400, "bad").is_retryable());
        assert!(!SubmitError::unauthenticated().is_retryable());
    }

    #[test]
    fn test_display_includes_status() {
        let err = SubmitError::from_status(500, "  internal  ");
        assert_eq!(err.to_string(), "Server error (HTTP 500): internal");
        assert_eq!(
            SubmitError::from_status(502, "").message,
            "empty response body"
        );
    }

    #[test]
    fn test_long_body_truncated() {
        let err = SubmitError::from_status(500, &"x".repeat(1000));
        assert!(err.message.len() < 310);
        assert!(err.message.ends_with("..."));
    }
}
