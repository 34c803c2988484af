//! Static game content: quests, shopping venues, hospitals and items.
//!
//! Loaded once at startup from JSON (the built-in file or `CATALOG_PATH`) and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::geo::{Coordinate, ProximityRadius};
use crate::task::{TaskDefinition, TaskKind};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

/// One physical destination of a task step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLocation {
    pub name: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
    /// What the player has to do there.
    #[serde(rename = "task")]
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub reward_points: u32,
    pub locations: Vec<TaskLocation>,
}

impl Quest {
    /// Workflow definition for this quest, one step per location.
    pub fn task_definition(&self, radius: ProximityRadius) -> TaskDefinition {
        TaskDefinition {
            id: format!("quest-{}", self.id),
            kind: TaskKind::Quest,
            title: self.name.clone(),
            locations: self.locations.clone(),
            radius,
            reward_points: self.reward_points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    Mall,
    Hospital,
}

impl std::fmt::Display for VenueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VenueKind::Mall => write!(f, "mall"),
            VenueKind::Hospital => write!(f, "hospital"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
}

/// Something that can be picked up at a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Name of the mall the item is found at.
    pub venue: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub quests: Vec<Quest>,
    #[serde(default)]
    pub malls: Vec<Venue>,
    #[serde(default)]
    pub hospitals: Vec<Venue>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Catalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            quests = catalog.quests.len(),
            malls = catalog.malls.len(),
            hospitals = catalog.hospitals.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    /// Use `path` when given, the built-in catalog otherwise.
    pub async fn load_or_builtin(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path).await,
            None => Self::builtin(),
        }
    }

    pub fn quest(&self, id: u32) -> Option<&Quest> {
        self.quests.iter().find(|q| q.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn venues(&self, kind: VenueKind) -> &[Venue] {
        match kind {
            VenueKind::Mall => &self.malls,
            VenueKind::Hospital => &self.hospitals,
        }
    }

    /// Single-step workflow for picking up `item` at its mall.
    pub fn item_task(&self, item_id: &str, radius: ProximityRadius) -> Option<TaskDefinition> {
        let item = self.item(item_id)?;
        let venue = self.malls.iter().find(|m| m.name == item.venue)?;
        Some(TaskDefinition {
            id: format!("item-{}", item.id),
            kind: TaskKind::Item,
            title: item.name.clone(),
            locations: vec![TaskLocation {
                name: venue.name.clone(),
                coordinate: venue.coordinate,
                instruction: format!("Photograph the {} you found at {}.", item.name, venue.name),
            }],
            radius,
            reward_points: 0,
        })
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let mut ids = HashSet::new();
        for quest in &self.quests {
            if !ids.insert(quest.id) {
                return Err(CatalogError::Invalid(format!("duplicate quest id {}", quest.id)));
            }
            if quest.locations.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "quest {} has no locations",
                    quest.id
                )));
            }
            for location in &quest.locations {
                check_coordinate(&location.name, location.coordinate)?;
            }
        }
        for venue in self.malls.iter().chain(self.hospitals.iter()) {
            check_coordinate(&venue.name, venue.coordinate)?;
        }
        for item in &self.items {
            if !self.malls.iter().any(|m| m.name == item.venue) {
                return Err(CatalogError::Invalid(format!(
                    "item {} refers to unknown mall '{}'",
                    item.id, item.venue
                )));
            }
        }
        Ok(())
    }
}

fn check_coordinate(name: &str, coordinate: Coordinate) -> Result<(), CatalogError> {
    if coordinate.is_valid() {
        Ok(())
    } else {
        Err(CatalogError::Invalid(format!(
            "'{}' has an invalid coordinate ({}, {})",
            name, coordinate.latitude, coordinate.longitude
        )))
    }
}
