//! Exclusive camera access.
//!
//! Only one [`CameraSession`] can exist per [`Camera`]. A session owns the
//! open video stream; capturing consumes it, and dropping it (cancel, step
//! reset, teardown) stops the stream. The device is therefore released on
//! every exit path without callers having to remember to do it.

mod evidence;
mod still;

pub use evidence::EvidenceCapture;
pub use still::StillImageCamera;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("Camera features are not supported on this device.")]
    Unsupported,

    #[error("Permission to use the camera was denied by you or the device settings.")]
    PermissionDenied,

    #[error("No camera found.")]
    NotFound,

    #[error("The requested camera cannot satisfy the capture constraints.")]
    Overconstrained,

    #[error("The camera could not be read. It may be in use by another application.")]
    NotReadable,

    #[error("The camera is already open for another capture.")]
    Busy,

    #[error("Capture failed: {0}")]
    CaptureFailed(String),
}

impl CameraError {
    /// Errors worth retrying with the default camera instead of the rear one.
    fn should_fall_back(&self) -> bool {
        matches!(
            self,
            CameraError::NotFound | CameraError::Overconstrained | CameraError::NotReadable
        )
    }
}

/// Which camera to ask the platform for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Rear camera, pointed at the surroundings.
    Environment,
    /// Whatever the platform picks.
    Any,
}

/// A raw frame grabbed from a stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: bytes::Bytes,
    pub mime_type: String,
}

/// An open video stream.
pub trait VideoStream: Send {
    fn grab_frame(&mut self) -> Result<Frame, CameraError>;

    /// Stop every track. Must be idempotent.
    fn stop(&mut self);
}

/// Platform camera backend.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, facing: Facing) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// Single-owner gate in front of a [`CameraDevice`].
#[derive(Clone)]
pub struct Camera {
    device: Arc<dyn CameraDevice>,
    permit: Arc<Semaphore>,
}

impl Camera {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// True while a session holds the device.
    pub fn is_in_use(&self) -> bool {
        self.permit.available_permits() == 0
    }

    /// Open the rear camera, falling back to the default one.
    pub async fn open(&self) -> Result<CameraSession, CameraError> {
        let permit = self
            .permit
            .clone()
            .try_acquire_owned()
            .map_err(|_| CameraError::Busy)?;

        let stream = match self.device.open(Facing::Environment).await {
            Ok(stream) => stream,
            Err(err) if err.should_fall_back() => {
                tracing::warn!("Environment camera failed ({}), trying default camera", err);
                self.device.open(Facing::Any).await?
            }
            Err(err) => return Err(err),
        };

        tracing::debug!("Camera session opened");
        Ok(CameraSession {
            stream,
            _permit: permit,
        })
    }
}

/// An open, exclusive capture session.
pub struct CameraSession {
    stream: Box<dyn VideoStream>,
    _permit: OwnedSemaphorePermit,
}

impl CameraSession {
    /// Grab one frame and release the camera.
    pub fn capture(mut self) -> Result<EvidenceCapture, CameraError> {
        let frame = self.stream.grab_frame()?;
        if frame.data.is_empty() {
            return Err(CameraError::CaptureFailed(
                "Camera not ready or stream unavailable for capture.".to_string(),
            ));
        }
        Ok(EvidenceCapture::new(frame.data, frame.mime_type))
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stream.stop();
        tracing::debug!("Camera session released");
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CameraSession")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_open_is_busy() {
        let device = Arc::new(StillImageCamera::new(vec![1, 2, 3]));
        let camera = Camera::new(device.clone());

        let session = camera.open().await.expect("first open");
        assert!(camera.is_in_use());
        assert_eq!(camera.open().await.unwrap_err(), CameraError::Busy);

        drop(session);
        assert!(!camera.is_in_use());
        assert_eq!(device.open_streams(), 0);
        camera.open().await.expect("reopen after release");
    }

    #[tokio::test]
    async fn test_capture_releases_device() {
        let device = Arc::new(StillImageCamera::new(vec![9, 9, 9]));
        let camera = Camera::new(device.clone());

        let capture = camera.open().await.unwrap().capture().unwrap();
        assert_eq!(&capture.image[..], &[9, 9, 9]);
        assert_eq!(capture.mime_type, "image/jpeg");
        assert!(!camera.is_in_use());
        assert_eq!(device.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_default_camera() {
        let device = Arc::new(
            StillImageCamera::new(vec![1]).failing_environment(CameraError::NotFound),
        );
        let camera = Camera::new(device.clone());
        let _session = camera.open().await.expect("fallback open");
        assert_eq!(device.opened_with(), vec![Facing::Environment, Facing::Any]);
    }

    #[tokio::test]
    async fn test_permission_denied_does_not_fall_back() {
        let device = Arc::new(
            StillImageCamera::new(vec![1]).failing_environment(CameraError::PermissionDenied),
        );
        let camera = Camera::new(device.clone());
        assert_eq!(camera.open().await.unwrap_err(), CameraError::PermissionDenied);
        assert_eq!(device.opened_with(), vec![Facing::Environment]);
        // A failed open must not keep the permit.
        assert!(!camera.is_in_use());
    }

    #[tokio::test]
    async fn test_empty_frame_is_capture_failure() {
        let device = Arc::new(StillImageCamera::new(Vec::new()));
        let camera = Camera::new(device.clone());
        let err = camera.open().await.unwrap().capture().unwrap_err();
        assert!(matches!(err, CameraError::CaptureFailed(_)));
        assert_eq!(device.open_streams(), 0);
    }
}
