//! A camera that always shows the same picture.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{CameraDevice, CameraError, Facing, Frame, VideoStream};

/// Serves a fixed JPEG. Tracks open streams so leaks are observable.
pub struct StillImageCamera {
    image: Bytes,
    environment_error: Option<CameraError>,
    open_streams: Arc<AtomicUsize>,
    opened_with: Mutex<Vec<Facing>>,
}

impl StillImageCamera {
    pub fn new(image: impl Into<Bytes>) -> Self {
        Self {
            image: image.into(),
            environment_error: None,
            open_streams: Arc::new(AtomicUsize::new(0)),
            opened_with: Mutex::new(Vec::new()),
        }
    }

    /// Make rear-camera requests fail with `error`.
    pub fn failing_environment(mut self, error: CameraError) -> Self {
        self.environment_error = Some(error);
        self
    }

    /// Streams opened and not yet stopped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub fn opened_with(&self) -> Vec<Facing> {
        self.opened_with
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    async fn open(&self, facing: Facing) -> Result<Box<dyn VideoStream>, CameraError> {
        if let Ok(mut calls) = self.opened_with.lock() {
            calls.push(facing);
        }
        if facing == Facing::Environment {
            if let Some(err) = &self.environment_error {
                return Err(err.clone());
            }
        }
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StillStream {
            image: self.image.clone(),
            open_streams: Arc::clone(&self.open_streams),
            stopped: false,
        }))
    }
}

struct StillStream {
    image: Bytes,
    open_streams: Arc<AtomicUsize>,
    stopped: bool,
}

impl VideoStream for StillStream {
    fn grab_frame(&mut self) -> Result<Frame, CameraError> {
        if self.stopped {
            return Err(CameraError::CaptureFailed("stream already stopped".to_string()));
        }
        Ok(Frame {
            data: self.image.clone(),
            mime_type: "image/jpeg".to_string(),
        })
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
