//! Vision model client used to caption uploaded map photos.
//!
//! [`ImageClassifier`] is the seam the marker service calls; Gemini is the
//! production implementation.

mod error;
mod gemini;

pub use error::{classify_http_status, ClassifyError, ClassifyErrorKind};
pub use gemini::GeminiClassifier;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// What the model saw in a photo.
///
/// `title` is a category such as `construction`, `crime` or a label read from
/// the image. Any extra fields the model returns are kept verbatim.
///
/// The marker file is hand-editable and model replies are loosely shaped, so
/// the text fields accept `null`, absence or non-string values instead of
/// failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerClassification {
    #[serde(default, deserialize_with = "lenient_title")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn lenient_title<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// Trait for image classifiers.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Classify a base64-encoded JPEG (no data-URL prefix).
    async fn classify(&self, image_base64: &str) -> Result<MarkerClassification, ClassifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_fields_are_accepted() {
        let parsed: MarkerClassification =
            serde_json::from_str(r#"{"description":null,"color":3,"lat":1.5}"#).unwrap();
        assert_eq!(parsed.title, "");
        assert_eq!(parsed.description, None);
        assert_eq!(parsed.color.as_deref(), Some("3"));
        assert_eq!(parsed.extra["lat"], 1.5);
    }
}
