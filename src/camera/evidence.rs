//! Photo evidence held in memory for the duration of one step.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::CameraError;

/// An image proving presence at a task location.
///
/// Never written to disk; dropped on submission, discard or cancel.
#[derive(Clone, PartialEq, Eq)]
pub struct EvidenceCapture {
    pub id: Uuid,
    pub image: Bytes,
    pub mime_type: String,
    pub captured_at: DateTime<Utc>,
}

impl EvidenceCapture {
    pub fn new(image: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: image.into(),
            mime_type: mime_type.into(),
            captured_at: Utc::now(),
        }
    }

    /// JPEG frame, the format the camera produces.
    pub fn jpeg(image: impl Into<Bytes>) -> Self {
        Self::new(image, "image/jpeg")
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, CameraError> {
        let invalid = || {
            CameraError::CaptureFailed(
                "Invalid image data. Could not extract Base64 content.".to_string(),
            )
        };

        let (header, payload) = url.split_once(',').ok_or_else(invalid)?;
        if payload.is_empty() || payload.contains(',') {
            return Err(invalid());
        }
        let mime_type = header
            .strip_prefix("data:")
            .and_then(|h| h.strip_suffix(";base64"))
            .filter(|m| !m.is_empty())
            .ok_or_else(invalid)?;
        let image = STANDARD.decode(payload).map_err(|_| invalid())?;
        Ok(Self::new(image, mime_type))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.image)
    }

    /// Preview handle for displaying the capture before upload.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

impl std::fmt::Debug for EvidenceCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceCapture")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.image.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_preview() {
        let capture = EvidenceCapture::jpeg(vec![0xff, 0xd8, 0xff]);
        assert_eq!(capture.data_url(), "data:image/jpeg;base64,/9j/");
        let parsed = EvidenceCapture::from_data_url(&capture.data_url()).unwrap();
        assert_eq!(parsed.image, capture.image);
        assert_eq!(parsed.mime_type, "image/jpeg");
    }

    #[test]
    fn test_malformed_data_url_rejected() {
        for bad in [
            "no comma here",
            "data:image/jpeg;base64,",
            "image/jpeg;base64,AAAA",
            "data:;base64,AAAA",
            "data:image/jpeg;base64,@@@",
            "data:image/jpeg;base64,AA,AA",
        ] {
            assert!(EvidenceCapture::from_data_url(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_debug_omits_image_bytes() {
        let capture = EvidenceCapture::jpeg(vec![1u8; 4096]);
        let debug = format!("{:?}", capture);
        assert!(debug.contains("bytes: 4096"));
        assert!(debug.len() < 300);
    }
}
