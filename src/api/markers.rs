//! Marker endpoints: list the map markers and classify new uploads.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use base64::Engine;

use super::marker_store::{Marker, MarkerDocument, MarkerStoreError};
use super::routes::AppState;
use super::types::{ErrorResponse, MarkerUploadRequest, MessageResponse};
use crate::geo::Coordinate;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

/// `GET /getMarkers`
pub async fn get_markers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MarkerDocument>, ApiError> {
    match state.store.load().await {
        Ok(document) => Ok(Json(document)),
        Err(e @ MarkerStoreError::Corrupt { .. }) => {
            tracing::error!("Error parsing markers: {}", e);
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Invalid JSON format"))
        }
        Err(e) => {
            tracing::error!("Error reading markers: {}", e);
            Err(error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load markers",
            ))
        }
    }
}

/// Accept raw base64 or a `data:image/...;base64,` URL; return the payload.
fn image_payload(image: &str) -> &str {
    let image = image.trim();
    match image.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(""),
        None => image,
    }
}

/// `POST /uploadMarker`
pub async fn upload_marker(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MarkerUploadRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let image = image_payload(&req.image);
    tracing::info!(
        lat = req.lat,
        lon = req.lon,
        image_chars = image.len(),
        "Marker upload received"
    );

    if image.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Image is required"));
    }
    if base64::engine::general_purpose::STANDARD
        .decode(image)
        .is_err()
    {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Image must be base64-encoded",
        ));
    }
    if !Coordinate::new(req.lat, req.lon).is_valid() {
        return Err(error(StatusCode::BAD_REQUEST, "Invalid coordinates"));
    }

    let classification = state.classifier.classify(image).await.map_err(|e| {
        tracing::warn!(transient = e.is_transient(), "Error analyzing image: {}", e);
        error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to process marker",
        )
    })?;

    let marker = Marker::new(classification, req.lat, req.lon);
    let count = state.store.append(marker).await.map_err(|e| {
        tracing::error!("Error saving marker: {}", e);
        error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to process marker",
        )
    })?;

    tracing::info!(count, "Marker stored");
    Ok(Json(MessageResponse {
        message: "Marker uploaded successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::marker_store::{FileMarkerStore, InMemoryMarkerStore, MarkerStore};
    use crate::config::Config;
    use crate::llm::{ClassifyError, ImageClassifier, MarkerClassification};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubClassifier {
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubClassifier {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageClassifier for StubClassifier {
        async fn classify(&self, _image: &str) -> Result<MarkerClassification, ClassifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ClassifyError::parse_error("Response is not valid JSON".to_string()));
            }
            Ok(MarkerClassification {
                title: "construction".to_string(),
                description: Some("Road dug up".to_string()),
                color: Some("orange".to_string()),
                extra: Default::default(),
            })
        }
    }

    fn state(
        store: Arc<dyn MarkerStore>,
        classifier: Arc<StubClassifier>,
    ) -> State<Arc<AppState>> {
        State(Arc::new(AppState {
            config: Config::new("key".to_string(), "markers.json".into()),
            store,
            classifier,
        }))
    }

    fn upload(image: &str, lat: f64, lon: f64) -> Json<MarkerUploadRequest> {
        Json(MarkerUploadRequest {
            lat,
            lon,
            image: image.to_string(),
        })
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let store = Arc::new(InMemoryMarkerStore::new());
        let classifier = Arc::new(StubClassifier::new(false));

        let Json(ack) = upload_marker(
            state(store.clone(), classifier.clone()),
            upload("/9j/4AAQ", 19.1234, 72.8363),
        )
        .await
        .unwrap();
        assert_eq!(ack.message, "Marker uploaded successfully");

        let Json(document) = get_markers(state(store, classifier)).await.unwrap();
        assert_eq!(document.markers.len(), 1);
        assert_eq!(document.markers[0].classification.title, "construction");
        assert_eq!(document.markers[0].lat, 19.1234);
    }

    #[tokio::test]
    async fn test_classifier_failure_stores_nothing() {
        let store = Arc::new(InMemoryMarkerStore::new());
        let classifier = Arc::new(StubClassifier::new(true));

        let (status, Json(body)) = upload_marker(
            state(store.clone(), classifier),
            upload("/9j/4AAQ", 19.1234, 72.8363),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Failed to process marker");
        assert!(store.load().await.unwrap().markers.is_empty());
    }

    #[tokio::test]
    async fn test_bad_requests_skip_the_model() {
        let store = Arc::new(InMemoryMarkerStore::new());
        let classifier = Arc::new(StubClassifier::new(false));

        for (image, lat, lon) in [
            ("", 19.0, 72.0),
            ("data:image/jpeg;base64,", 19.0, 72.0),
            ("not base64!", 19.0, 72.0),
            ("/9j/4AAQ", f64::NAN, 72.0),
            ("/9j/4AAQ", 19.0, 200.0),
        ] {
            let (status, _) = upload_marker(
                state(store.clone(), classifier.clone()),
                upload(image, lat, lon),
            )
            .await
            .unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST, "image={:?} lat={} lon={}", image, lat, lon);
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_data_url_prefix_accepted() {
        assert_eq!(image_payload("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(image_payload("  QUJD \n"), "QUJD");
    }

    #[tokio::test]
    async fn test_corrupt_marker_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        std::fs::write(&path, "not json").unwrap();
        let store = Arc::new(FileMarkerStore::new(&path));
        let classifier = Arc::new(StubClassifier::new(false));

        let (status, Json(body)) = get_markers(state(store.clone(), classifier.clone()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Invalid JSON format");

        let (_, Json(body)) = upload_marker(
            state(store, classifier),
            upload("/9j/4AAQ", 19.1234, 72.8363),
        )
        .await
        .unwrap_err();
        assert_eq!(body.error, "Failed to process marker");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }

    #[tokio::test]
    async fn test_unreadable_marker_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be read as one.
        let store = Arc::new(FileMarkerStore::new(dir.path()));
        let (_, Json(body)) = get_markers(state(store, Arc::new(StubClassifier::new(false))))
            .await
            .unwrap_err();
        assert_eq!(body.error, "Failed to load markers");
    }
}
