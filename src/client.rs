//! Player-side stack assembled from [`WorkflowConfig`].
//!
//! One [`QuestClient`] owns the catalog, the shared position provider, the
//! venue gate and the completion sinks, and hands out a fresh
//! [`TaskWorkflow`] per quest or item pickup.

use std::sync::Arc;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::config::WorkflowConfig;
use crate::geo::ProximityRadius;
use crate::location::{PositionProvider, PositionSource};
use crate::progress::{CompletionSink, MarkerUploadClient, ProgressApiClient, SubmitError};
use crate::session::Session;
use crate::task::{TaskDefinition, TaskWorkflow};
use crate::venue::VenueGate;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Invalid marker upload endpoint: {0}")]
    MarkerEndpoint(#[from] SubmitError),
}

pub struct QuestClient {
    catalog: Catalog,
    positions: PositionProvider,
    quest_radius: ProximityRadius,
    venue_radius: ProximityRadius,
    venues: VenueGate,
    progress: Arc<dyn CompletionSink>,
    markers: Arc<MarkerUploadClient>,
    session: Session,
}

impl QuestClient {
    /// Load the catalog and wire every collaborator to `config`.
    pub async fn from_config(
        config: &WorkflowConfig,
        source: Arc<dyn PositionSource>,
        access_token: Option<String>,
    ) -> Result<Self, ClientError> {
        let catalog = Catalog::load_or_builtin(config.catalog_path.as_deref()).await?;
        let positions = PositionProvider::with_request(source, config.position_request());
        let venues = VenueGate::new(&catalog, positions.clone(), config.venue_radius);
        let markers = Arc::new(MarkerUploadClient::new(&config.marker_upload_url)?);

        tracing::debug!(
            quests = catalog.quests.len(),
            api = %config.api_base_url,
            markers = %markers.url(),
            "Quest client ready"
        );

        Ok(Self {
            catalog,
            positions,
            quest_radius: config.quest_radius,
            venue_radius: config.venue_radius,
            venues,
            progress: Arc::new(ProgressApiClient::new()),
            markers,
            session: config.session(access_token),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shop and hospital access checks.
    pub fn venues(&self) -> &VenueGate {
        &self.venues
    }

    /// Sink that pins evidence to the shared map.
    pub fn marker_uploader(&self) -> Arc<MarkerUploadClient> {
        Arc::clone(&self.markers)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Workflow for quest `id`, recording progress with the persistence API.
    pub fn quest(&self, id: u32) -> Option<TaskWorkflow> {
        let definition = self.catalog.quest(id)?.task_definition(self.quest_radius);
        Some(self.workflow(definition))
    }

    /// Single-step workflow for collecting `item_id` at its mall.
    pub fn item_pickup(&self, item_id: &str) -> Option<TaskWorkflow> {
        let definition = self.catalog.item_task(item_id, self.venue_radius)?;
        Some(self.workflow(definition))
    }

    fn workflow(&self, definition: TaskDefinition) -> TaskWorkflow {
        TaskWorkflow::new(
            definition,
            self.positions.clone(),
            Arc::clone(&self.progress),
            self.session.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VenueKind;
    use crate::geo::Coordinate;
    use crate::location::FixedPositionSource;
    use crate::venue::VenueError;
    use std::path::PathBuf;
    use std::time::Duration;

    /// About 40 m south of the mall.
    const NEAR_MALL: Coordinate = Coordinate::new(19.14064, 72.8311);

    fn source() -> Arc<dyn PositionSource> {
        Arc::new(FixedPositionSource::new(NEAR_MALL, 5.0))
    }

    #[tokio::test]
    async fn test_builds_from_config() {
        let config = WorkflowConfig {
            quest_radius: ProximityRadius::new(25.0).unwrap(),
            location_timeout: Duration::from_secs(4),
            marker_upload_url: "http://10.0.0.5:4000/uploadMarker".to_string(),
            ..WorkflowConfig::default()
        };
        let client = QuestClient::from_config(&config, source(), Some("tok".to_string()))
            .await
            .unwrap();

        let quest = client.quest(1).unwrap();
        assert_eq!(quest.definition().radius.meters(), 25.0);
        assert_eq!(quest.definition().locations.len(), 3);
        assert!(client.quest(999).is_none());

        let pickup = client.item_pickup("butterbeer").unwrap();
        assert_eq!(pickup.definition().radius, ProximityRadius::VENUE_DEFAULT);

        assert_eq!(
            client.marker_uploader().url().as_str(),
            "http://10.0.0.5:4000/uploadMarker"
        );
        assert_eq!(client.session().access_token(), Some("tok"));
        assert_eq!(client.positions.request().timeout, Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_venue_radius_comes_from_config() {
        let client = QuestClient::from_config(&WorkflowConfig::default(), source(), None)
            .await
            .unwrap();
        assert!(client.venues().check(VenueKind::Mall).await.is_ok());

        let tight = WorkflowConfig {
            venue_radius: ProximityRadius::new(10.0).unwrap(),
            ..WorkflowConfig::default()
        };
        let client = QuestClient::from_config(&tight, source(), None).await.unwrap();
        assert!(matches!(
            client.venues().check(VenueKind::Mall).await,
            Err(VenueError::NotNearby { .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_settings_are_rejected() {
        let bad_url = WorkflowConfig {
            marker_upload_url: "ftp://example.com/upload".to_string(),
            ..WorkflowConfig::default()
        };
        assert!(matches!(
            QuestClient::from_config(&bad_url, source(), None).await,
            Err(ClientError::MarkerEndpoint(_))
        ));

        let missing_catalog = WorkflowConfig {
            catalog_path: Some(PathBuf::from("/nonexistent/catalog.json")),
            ..WorkflowConfig::default()
        };
        assert!(matches!(
            QuestClient::from_config(&missing_catalog, source(), None).await,
            Err(ClientError::Catalog(CatalogError::Io { .. }))
        ));
    }
}
