//! HTTP API for the marker service.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /getMarkers` - All markers as `{"markers": [...]}`
//! - `POST /uploadMarker` - Classify a photo and pin it at `lat`/`lon`

pub mod marker_store;
mod markers;
mod routes;
pub mod types;

pub use marker_store::{
    FileMarkerStore, InMemoryMarkerStore, Marker, MarkerDocument, MarkerStore, MarkerStoreError,
};
pub use routes::{router, serve, AppState};
pub use types::*;
