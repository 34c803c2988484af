//! Gemini `generateContent` client for photo classification.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::ClassifyError;
use super::{ImageClassifier, MarkerClassification};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const FENCE_PATTERN: &str = r"```json\n?|\n?```";

const CLASSIFICATION_PROMPT: &str = r#"Look at the image and extract relevant text info from the image. Return a JSON object for the following classes: construction, some label or text in the image, some crime being committed (should be titled as "crime") in the image or any distinct category. The JSON should be formatted in the following manner:

{
  "title": "construction/crime/<any label>",
  "description": "some description",
  "color": "color based on title"
}

the purpose is to update map data in real time. create title, description and color accordingly
Please return only valid JSON without any additional text or markdown formatting."#;

/// Gemini vision client.
pub struct GeminiClassifier {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClassifier {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    /// Point the client at another endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_for(image_base64: &str) -> GenerateRequest<'_> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: CLASSIFICATION_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data: image_base64,
                        },
                    },
                ],
            }],
        }
    }
}

/// Remove markdown code fences the model wraps around JSON despite being told
/// not to.
fn strip_fences(text: &str) -> Result<String, ClassifyError> {
    let fence = Regex::new(FENCE_PATTERN)
        .map_err(|e| ClassifyError::parse_error(format!("Invalid fence pattern: {}", e)))?;
    Ok(fence.replace_all(text, "").trim().to_string())
}

fn parse_classification(text: &str) -> Result<MarkerClassification, ClassifyError> {
    let cleaned = strip_fences(text)?;
    serde_json::from_str(&cleaned).map_err(|_| {
        ClassifyError::parse_error(format!("Response is not valid JSON: {}", cleaned))
    })
}

#[async_trait]
impl ImageClassifier for GeminiClassifier {
    async fn classify(&self, image_base64: &str) -> Result<MarkerClassification, ClassifyError> {
        tracing::debug!(
            model = %self.model,
            image_chars = image_base64.len(),
            "Sending image to Gemini"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&Self::request_for(image_base64))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifyError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    ClassifyError::network_error(format!("Connection failed: {}", e))
                } else {
                    ClassifyError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ClassifyError::from_status(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            ClassifyError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
        })?;
        let text = parsed.text().ok_or_else(|| {
            ClassifyError::parse_error("No text candidate in response".to_string())
        })?;

        let classification = parse_classification(&text)?;
        tracing::info!(title = %classification.title, "Image classified");
        Ok(classification)
    }
}

/// Gemini request format.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

/// Gemini response format.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ClassifyErrorKind;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_strips_markdown_fences() {
        let text = "```json\n{\"title\":\"crime\",\"description\":\"graffiti\",\"color\":\"red\"}\n```";
        let parsed = parse_classification(text).unwrap();
        assert_eq!(parsed.title, "crime");
        assert_eq!(parsed.color.as_deref(), Some("red"));
        assert!(parsed.extra.is_empty());
    }

    #[test]
    fn test_keeps_extra_fields() {
        let text = r#"{"title":"label","description":"Bus stop","color":"blue","confidence":0.9}"#;
        let parsed = parse_classification(text).unwrap();
        assert_eq!(parsed.extra["confidence"], 0.9);
        let round = serde_json::to_value(&parsed).unwrap();
        assert_eq!(round["confidence"], 0.9);
        assert_eq!(round["title"], "label");
    }

    #[test]
    fn test_null_description_is_accepted() {
        let parsed =
            parse_classification(r#"{"title":"crime","description":null,"color":"red"}"#).unwrap();
        assert_eq!(parsed.title, "crime");
        assert!(parsed.description.is_none());
    }

    #[test]
    fn test_rejects_prose() {
        let err = parse_classification("I see a construction site.").unwrap_err();
        assert_eq!(err.kind, ClassifyErrorKind::ParseError);
        assert!(err.message.starts_with("Response is not valid JSON"));
    }

    #[test]
    fn test_request_shape() {
        let value = serde_json::to_value(GeminiClassifier::request_for("QUJD")).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("only valid JSON"));
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "QUJD");
    }

    #[tokio::test]
    async fn test_classify_against_local_endpoint() {
        let router = Router::new().route(
            "/models/*call",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("x-goog-api-key").unwrap(), "key");
                assert_eq!(body["contents"][0]["parts"][1]["inline_data"]["data"], "QUJD");
                Json(serde_json::json!({
                    "candidates": [{
                        "content": {"parts": [{"text": "```json\n{\"title\":\"construction\",\"description\":\"Road work\",\"color\":\"orange\"}\n```"}]}
                    }]
                }))
            }),
        );
        let base = spawn(router).await;
        let classifier =
            GeminiClassifier::new("key".to_string(), "gemini-test".to_string()).with_base_url(base);

        let result = classifier.classify("QUJD").await.unwrap();
        assert_eq!(result.title, "construction");
        assert_eq!(result.description.as_deref(), Some("Road work"));
    }

    #[tokio::test]
    async fn test_http_errors_are_classified() {
        let router = Router::new().route(
            "/models/*call",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
        );
        let base = spawn(router).await;
        let classifier =
            GeminiClassifier::new("key".to_string(), "gemini-test".to_string()).with_base_url(base);

        let err = classifier.classify("QUJD").await.unwrap_err();
        assert_eq!(err.kind, ClassifyErrorKind::RateLimited);
        assert!(err.is_transient());
    }
}
