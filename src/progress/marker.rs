//! Client for the map marker service.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionReceipt, CompletionSink, CompletionSubmission, SubmitError};
use crate::session::Session;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Body accepted by `POST /uploadMarker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerUploadRequest {
    pub lat: f64,
    pub lon: f64,
    /// Base64 JPEG without a data-URL prefix.
    pub image: String,
}

#[derive(Debug, Default, Deserialize)]
struct UploadAck {
    #[serde(default)]
    message: Option<String>,
}

/// Uploads evidence as a map marker.
///
/// The marker service is unauthenticated; the session is not consulted.
pub struct MarkerUploadClient {
    client: Client,
    url: url::Url,
}

impl MarkerUploadClient {
    /// Fails unless `upload_url` is an absolute http(s) URL.
    pub fn new(upload_url: &str) -> Result<Self, SubmitError> {
        let url = url::Url::parse(upload_url).map_err(|e| {
            SubmitError::invalid_request(format!(
                "MARKER_UPLOAD_URL is malformed: \"{}\" ({})",
                upload_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SubmitError::invalid_request(format!(
                "MARKER_UPLOAD_URL must use http or https: \"{}\"",
                upload_url
            )));
        }
        Ok(Self {
            client: Client::new(),
            url,
        })
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    fn request_for(submission: &CompletionSubmission) -> MarkerUploadRequest {
        let coordinate = submission.position.coordinate.rounded(5);
        MarkerUploadRequest {
            lat: coordinate.latitude,
            lon: coordinate.longitude,
            image: submission.evidence.to_base64(),
        }
    }
}

#[async_trait]
impl CompletionSink for MarkerUploadClient {
    async fn record(
        &self,
        _session: &Session,
        submission: &CompletionSubmission,
    ) -> Result<CompletionReceipt, SubmitError> {
        let payload = Self::request_for(submission);
        tracing::info!(
            lat = payload.lat,
            lon = payload.lon,
            image_chars = payload.image.len(),
            "Uploading marker to {}",
            self.url
        );

        let response = self
            .client
            .post(self.url.clone())
            .timeout(UPLOAD_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SubmitError::from_reqwest(e, UPLOAD_TIMEOUT))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SubmitError::from_status(status.as_u16(), &body));
        }

        let ack: UploadAck = serde_json::from_str(&body).unwrap_or_default();
        Ok(CompletionReceipt {
            task_id: submission.task_id.clone(),
            step: submission.step,
            acknowledged_at: Utc::now(),
            message: ack.message,
        })
    }
}
