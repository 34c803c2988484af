//! Classifier error types with retry classification.
//!
//! Distinguishes between transient errors (worth another upload) and permanent
//! errors.

/// Error from a vision model call.
#[derive(Debug)]
pub struct ClassifyError {
    /// The kind of error
    pub kind: ClassifyErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl ClassifyError {
    /// Create a rate limit error.
    pub fn rate_limited(message: String) -> Self {
        Self {
            kind: ClassifyErrorKind::RateLimited,
            status_code: Some(429),
            message,
        }
    }

    /// Create a server error.
    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: ClassifyErrorKind::ServerError,
            status_code: Some(status_code),
            message,
        }
    }

    /// Create a client error (bad request, bad key, etc.).
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: ClassifyErrorKind::ClientError,
            status_code: Some(status_code),
            message,
        }
    }

    pub fn network_error(message: String) -> Self {
        Self {
            kind: ClassifyErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    /// The model answered, but not with a usable JSON object.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: ClassifyErrorKind::ParseError,
            status_code: None,
            message,
        }
    }

    /// Build the error for a non-success HTTP response.
    pub fn from_status(status_code: u16, body: &str) -> Self {
        match classify_http_status(status_code) {
            ClassifyErrorKind::RateLimited => Self::rate_limited(body.to_string()),
            ClassifyErrorKind::ClientError => Self::client_error(status_code, body.to_string()),
            _ => Self::server_error(status_code, body.to_string()),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl std::fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ClassifyError {}

/// Classification of classifier errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifyErrorKind {
    /// Rate limited (429) - transient
    RateLimited,
    /// Server error (5xx) - transient
    ServerError,
    /// Client error (400, 401, 403, 404) - permanent
    ClientError,
    /// Connection failed or timed out - transient
    NetworkError,
    /// Model output was not the expected JSON - usually permanent
    ParseError,
}

impl ClassifyErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClassifyErrorKind::RateLimited
                | ClassifyErrorKind::ServerError
                | ClassifyErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for ClassifyErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifyErrorKind::RateLimited => write!(f, "Rate limited"),
            ClassifyErrorKind::ServerError => write!(f, "Server error"),
            ClassifyErrorKind::ClientError => write!(f, "Client error"),
            ClassifyErrorKind::NetworkError => write!(f, "Network error"),
            ClassifyErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> ClassifyErrorKind {
    match status {
        429 => ClassifyErrorKind::RateLimited,
        500 | 502 | 503 | 504 => ClassifyErrorKind::ServerError,
        400..=499 => ClassifyErrorKind::ClientError,
        _ => ClassifyErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ClassifyErrorKind::RateLimited.is_transient());
        assert!(ClassifyErrorKind::ServerError.is_transient());
        assert!(ClassifyErrorKind::NetworkError.is_transient());
        assert!(!ClassifyErrorKind::ClientError.is_transient());
        assert!(!ClassifyErrorKind::ParseError.is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), ClassifyErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), ClassifyErrorKind::ServerError);
        assert_eq!(classify_http_status(503), ClassifyErrorKind::ServerError);
        assert_eq!(classify_http_status(400), ClassifyErrorKind::ClientError);
        assert_eq!(classify_http_status(403), ClassifyErrorKind::ClientError);
    }

    #[test]
    fn test_display_includes_status() {
        let err = ClassifyError::from_status(400, "API key not valid");
        assert_eq!(err.kind, ClassifyErrorKind::ClientError);
        assert_eq!(
            err.to_string(),
            "Client error (HTTP 400): API key not valid"
        );
        assert_eq!(
            ClassifyError::parse_error("not json".to_string()).to_string(),
            "Parse error: not json"
        );
    }
}
