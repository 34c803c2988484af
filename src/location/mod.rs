//! One-shot device position queries.
//!
//! A [`PositionProvider`] wraps a [`PositionSource`] (the platform geolocation
//! API) and enforces the request policy every workflow check relies on:
//! high accuracy, a bounded wait and no cached fixes. Each call issues exactly
//! one source query; concurrent callers are served one after another.

mod scripted;

pub use scripted::{FixedPositionSource, ScriptedPositionSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::geo::Coordinate;

/// Failure categories of a position query.
///
/// `PermissionDenied` and `Unsupported` are terminal until the user changes
/// device settings; the other two can be retried by the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied. Enable location access for this app in your device settings.")]
    PermissionDenied,

    #[error("Location information is unavailable: {0}")]
    PositionUnavailable(String),

    #[error("Timed out waiting for a location fix after {0:?}")]
    Timeout(Duration),

    #[error("Geolocation is not supported on this device.")]
    Unsupported,
}

impl LocationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocationError::PositionUnavailable(_) | LocationError::Timeout(_)
        )
    }
}

/// Options passed to the platform for every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest acceptable fix. Zero means a fresh fix is required.
    pub maximum_age: Duration,
}

impl Default for PositionRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(15),
            maximum_age: Duration::ZERO,
        }
    }
}

/// A position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionReading {
    pub coordinate: Coordinate,
    pub accuracy_meters: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionReading {
    pub fn new(coordinate: Coordinate, accuracy_meters: f64) -> Self {
        Self {
            coordinate,
            accuracy_meters,
            timestamp: Utc::now(),
        }
    }
}

/// Platform geolocation backend.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Resolve a single fix. Implementations must not start a continuous watch.
    async fn locate(&self, request: &PositionRequest) -> Result<PositionReading, LocationError>;
}

/// Timeout-bounded, single-in-flight access to a [`PositionSource`].
#[derive(Clone)]
pub struct PositionProvider {
    source: Arc<dyn PositionSource>,
    request: PositionRequest,
    in_flight: Arc<Mutex<()>>,
}

impl PositionProvider {
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self::with_request(source, PositionRequest::default())
    }

    pub fn with_request(source: Arc<dyn PositionSource>, request: PositionRequest) -> Self {
        Self {
            source,
            request,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn request(&self) -> &PositionRequest {
        &self.request
    }

    /// Query the current position once.
    pub async fn current_position(&self) -> Result<PositionReading, LocationError> {
        let _guard = self.in_flight.lock().await;
        let issued_at = Utc::now();

        let reading = match tokio::time::timeout(
            self.request.timeout,
            self.source.locate(&self.request),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.request.timeout.as_secs(),
                    "Position query timed out"
                );
                return Err(LocationError::Timeout(self.request.timeout));
            }
        };

        if !reading.coordinate.is_valid() {
            return Err(LocationError::PositionUnavailable(format!(
                "device reported an invalid coordinate ({})",
                reading.coordinate
            )));
        }

        let age = issued_at
            .signed_duration_since(reading.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age > self.request.maximum_age {
            tracing::debug!(age_ms = age.as_millis() as u64, "Discarding cached position fix");
            return Err(LocationError::PositionUnavailable(
                "only a cached position was available".to_string(),
            ));
        }

        tracing::debug!(
            position = %reading.coordinate,
            accuracy_m = reading.accuracy_meters,
            "Position fix"
        );
        Ok(reading)
    }
}
