//! API request and response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /uploadMarker`.
pub use crate::progress::MarkerUploadRequest;

/// Success body: `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Vision model used to classify uploads
    pub model: String,

    /// Whether markers survive a restart
    pub persistent_store: bool,
}
