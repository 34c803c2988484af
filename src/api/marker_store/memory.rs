//! In-memory marker store (non-persistent).

use super::{Marker, MarkerDocument, MarkerStore, MarkerStoreError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryMarkerStore {
    markers: Arc<RwLock<Vec<Marker>>>,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerStore for InMemoryMarkerStore {
    async fn load(&self) -> Result<MarkerDocument, MarkerStoreError> {
        Ok(MarkerDocument {
            markers: self.markers.read().await.clone(),
        })
    }

    async fn append(&self, marker: Marker) -> Result<usize, MarkerStoreError> {
        let mut markers = self.markers.write().await;
        markers.push(marker);
        Ok(markers.len())
    }
}
