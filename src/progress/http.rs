//! Quest-progress / inventory API client.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionReceipt, CompletionSink, CompletionSubmission, SubmitError};
use crate::session::Session;
use crate::task::TaskKind;

const QUEST_COMPLETE_PATH: &str = "/game/quests/complete/";
const ITEM_ACQUIRE_PATH: &str = "/game/inventory/acquire/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionPayload<'a> {
    task_id: &'a str,
    step: usize,
    location: &'a str,
    /// Base64 image without a data-URL prefix.
    evidence: String,
    mime_type: &'a str,
    coordinates: PayloadCoordinates,
    accuracy_meters: f64,
}

#[derive(Debug, Serialize)]
struct PayloadCoordinates {
    lat: f64,
    lon: f64,
}

impl<'a> CompletionPayload<'a> {
    fn from_submission(submission: &'a CompletionSubmission) -> Self {
        let coordinate = submission.position.coordinate;
        Self {
            task_id: &submission.task_id,
            step: submission.step,
            location: &submission.location_name,
            evidence: submission.evidence.to_base64(),
            mime_type: &submission.evidence.mime_type,
            coordinates: PayloadCoordinates {
                lat: coordinate.latitude,
                lon: coordinate.longitude,
            },
            accuracy_meters: submission.position.accuracy_meters,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AckBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Posts completions to the persistence API with the session's bearer token.
pub struct ProgressApiClient {
    client: Client,
    timeout: Duration,
}

impl ProgressApiClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    fn path_for(kind: TaskKind) -> &'static str {
        match kind {
            TaskKind::Quest => QUEST_COMPLETE_PATH,
            TaskKind::Item => ITEM_ACQUIRE_PATH,
        }
    }
}

impl Default for ProgressApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionSink for ProgressApiClient {
    async fn record(
        &self,
        session: &Session,
        submission: &CompletionSubmission,
    ) -> Result<CompletionReceipt, SubmitError> {
        let token = session.access_token().ok_or_else(SubmitError::unauthenticated)?;
        let url = session.endpoint(Self::path_for(submission.kind));
        let payload = CompletionPayload::from_submission(submission);

        tracing::info!(
            task_id = %submission.task_id,
            step = submission.step,
            evidence_bytes = submission.evidence.len(),
            "Recording completion at {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SubmitError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Completion rejected");
            return Err(SubmitError::from_status(status.as_u16(), &body));
        }

        let ack: AckBody = serde_json::from_str(&body).unwrap_or_default();
        Ok(CompletionReceipt {
            task_id: submission.task_id.clone(),
            step: submission.step,
            acknowledged_at: Utc::now(),
            message: ack.message.or(ack.detail),
        })
    }
}
