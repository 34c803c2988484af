//! Recording completed steps with external services.
//!
//! The workflow hands a [`CompletionSubmission`] to a [`CompletionSink`] once
//! the player has been verified on site. Two sinks exist:
//! - [`ProgressApiClient`]: the quest-progress / inventory API
//! - [`MarkerUploadClient`]: the map marker service

mod error;
mod http;
mod marker;

pub use error::{classify_http_status, SubmitError, SubmitErrorKind};
pub use http::ProgressApiClient;
pub use marker::{MarkerUploadClient, MarkerUploadRequest};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::camera::EvidenceCapture;
use crate::location::PositionReading;
use crate::session::Session;
use crate::task::TaskKind;

/// Everything the persistence side needs to record one step.
#[derive(Debug, Clone)]
pub struct CompletionSubmission {
    pub task_id: String,
    pub kind: TaskKind,
    pub step: usize,
    pub location_name: String,
    pub evidence: EvidenceCapture,
    /// The fix that passed the final proximity check.
    pub position: PositionReading,
}

/// Acknowledgement of a recorded step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionReceipt {
    pub task_id: String,
    pub step: usize,
    pub acknowledged_at: DateTime<Utc>,
    /// Free-form server message, if any.
    pub message: Option<String>,
}

/// External collaborator that persists step completions.
///
/// `Ok` means the server acknowledged the completion; anything else leaves the
/// step open for resubmission.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn record(
        &self,
        session: &Session,
        submission: &CompletionSubmission,
    ) -> Result<CompletionReceipt, SubmitError>;
}
