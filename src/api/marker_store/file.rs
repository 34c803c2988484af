//! JSON file-based marker store.

use super::{Marker, MarkerDocument, MarkerStore, MarkerStoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// Reads the marker file on every request so hand edits show up immediately.
#[derive(Clone)]
pub struct FileMarkerStore {
    path: PathBuf,
    persist_lock: Arc<Mutex<()>>,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<MarkerDocument, MarkerStoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MarkerDocument::default());
            }
            Err(source) => {
                return Err(MarkerStoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| MarkerStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn persist(&self, document: &MarkerDocument) -> Result<(), MarkerStoreError> {
        let data = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        let io_err = |source: std::io::Error| MarkerStoreError::Io {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp_path, data).await.map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<MarkerDocument, MarkerStoreError> {
        self.read().await
    }

    async fn append(&self, marker: Marker) -> Result<usize, MarkerStoreError> {
        let _guard = self.persist_lock.lock().await;
        let mut document = self.read().await?;
        document.markers.push(marker);
        self.persist(&document).await?;
        tracing::debug!(
            path = %self.path.display(),
            count = document.markers.len(),
            "Marker file updated"
        );
        Ok(document.markers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MarkerClassification;

    fn marker(title: &str) -> Marker {
        Marker::new(
            MarkerClassification {
                title: title.to_string(),
                description: Some("seen on the walk".to_string()),
                color: Some("orange".to_string()),
                extra: Default::default(),
            },
            19.1234,
            72.8363,
        )
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMarkerStore::new(dir.path().join("markers.json"));
        assert!(store.load().await.unwrap().markers.is_empty());
    }

    #[tokio::test]
    async fn test_append_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        let store = FileMarkerStore::new(&path);

        assert_eq!(store.append(marker("construction")).await.unwrap(), 1);
        assert_eq!(store.append(marker("crime")).await.unwrap(), 2);

        let reopened = FileMarkerStore::new(&path);
        let titles: Vec<_> = reopened
            .load()
            .await
            .unwrap()
            .markers
            .into_iter()
            .map(|m| m.classification.title)
            .collect();
        assert_eq!(titles, vec!["construction", "crime"]);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["markers"][0]["title"], "construction");
        assert_eq!(raw["markers"][0]["lat"], 19.1234);
        assert!(!dir.path().join("markers.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileMarkerStore::new(&path);

        assert!(matches!(
            store.load().await,
            Err(MarkerStoreError::Corrupt { .. })
        ));
        assert!(matches!(
            store.append(marker("label")).await,
            Err(MarkerStoreError::Corrupt { .. })
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_hand_edited_entries_load_and_accept_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        std::fs::write(
            &path,
            r#"{"markers":[
                {"title":"construction","description":"Road work","color":"orange","lat":19.1,"lon":72.8},
                {"title":"crime","description":null,"lat":19.2,"lon":72.9},
                {"description":"no title","color":"grey","lat":19.3,"lon":73.0}
            ]}"#,
        )
        .unwrap();
        let store = FileMarkerStore::new(&path);

        let document = store.load().await.unwrap();
        assert_eq!(document.markers.len(), 3);
        assert_eq!(document.markers[1].classification.description, None);
        assert_eq!(document.markers[2].classification.title, "");

        assert_eq!(store.append(marker("label")).await.unwrap(), 4);
        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw["markers"][1]["description"].is_null());
        assert_eq!(raw["markers"][3]["title"], "label");
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMarkerStore::new(dir.path().join("markers.json"));

        let results = futures::future::join_all(
            (0..8).map(|i| store.append(marker(&format!("m{}", i)))),
        )
        .await;
        let mut counts: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        counts.sort_unstable();
        assert_eq!(counts, (1..=8).collect::<Vec<_>>());
        assert_eq!(store.load().await.unwrap().markers.len(), 8);
    }

    #[tokio::test]
    async fn test_model_coordinates_are_replaced() {
        let mut extra = serde_json::Map::new();
        extra.insert("lat".to_string(), serde_json::json!(0.0));
        extra.insert("note".to_string(), serde_json::json!("kept"));
        let marker = Marker::new(
            MarkerClassification {
                title: "label".to_string(),
                description: None,
                color: Some("blue".to_string()),
                extra,
            },
            19.1,
            72.8,
        );
        let value = serde_json::to_value(&marker).unwrap();
        assert_eq!(value["lat"], 19.1);
        assert_eq!(value["note"], "kept");
    }
}
