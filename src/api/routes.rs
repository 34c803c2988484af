//! HTTP route definitions and server setup.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::marker_store::{FileMarkerStore, MarkerStore};
use super::markers;
use super::types::HealthResponse;
use crate::config::Config;
use crate::llm::{GeminiClassifier, ImageClassifier};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn MarkerStore>,
    pub classifier: Arc<dyn ImageClassifier>,
}

impl AppState {
    /// Production state: Gemini classifier and the configured marker file.
    pub fn from_config(config: Config) -> Self {
        let classifier = GeminiClassifier::new(
            config.classifier.api_key.clone(),
            config.classifier.model.clone(),
        );
        let store = FileMarkerStore::new(config.markers_path.clone());
        Self {
            config,
            store: Arc::new(store),
            classifier: Arc::new(classifier),
        }
    }
}

/// Build the router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/api/health", get(health))
        .route("/getMarkers", get(markers::get_markers))
        .route("/uploadMarker", post(markers::upload_marker))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!(
        markers = %config.markers_path.display(),
        model = %config.classifier.model,
        "Marker service starting"
    );

    let state = Arc::new(AppState::from_config(config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.classifier.model.clone(),
        persistent_store: state.store.is_persistent(),
    })
}
