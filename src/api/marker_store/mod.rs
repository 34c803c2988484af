//! Marker storage with pluggable backends.
//!
//! Supports:
//! - `memory`: in-memory storage (non-persistent, for testing)
//! - `file`: the JSON marker file served to map clients

mod file;
mod memory;

pub use file::FileMarkerStore;
pub use memory::InMemoryMarkerStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::llm::MarkerClassification;

/// A classified photo pinned to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(flatten)]
    pub classification: MarkerClassification,
    pub lat: f64,
    pub lon: f64,
}

impl Marker {
    pub fn new(mut classification: MarkerClassification, lat: f64, lon: f64) -> Self {
        // Coordinates come from the uploader, never from the model.
        classification.extra.remove("lat");
        classification.extra.remove("lon");
        Self {
            classification,
            lat,
            lon,
        }
    }
}

/// On-disk layout: `{ "markers": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerDocument {
    #[serde(default)]
    pub markers: Vec<Marker>,
}

#[derive(Debug, Error)]
pub enum MarkerStoreError {
    #[error("Failed to access marker file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a marker document. It is left untouched.
    #[error("Marker file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize markers: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Marker store trait - implemented by all storage backends.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Whether this store survives a restart.
    fn is_persistent(&self) -> bool {
        false
    }

    /// Current document. A store that has never been written is empty.
    async fn load(&self) -> Result<MarkerDocument, MarkerStoreError>;

    /// Append one marker. Returns the number of markers now stored.
    async fn append(&self, marker: Marker) -> Result<usize, MarkerStoreError>;
}
