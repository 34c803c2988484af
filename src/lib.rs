//! # Marauder's Map
//!
//! Geofenced quests: players walk to real-world locations, prove they are
//! there with a photo, and earn rewards once every step is verified.
//!
//! This library provides:
//! - Location-verified task steps (quests and item pickups)
//! - Proximity gating for shops and hospitals
//! - The map marker service that captions uploaded photos with a vision model
//!
//! ## Step Flow
//!
//! ```text
//!   start ──► confirm_arrival ──► open_camera / attach_evidence ──► submit
//!     │            │                          │                        │
//!     ▼            ▼                          ▼                        ▼
//!  position    position +               exclusive camera         position +
//!   (origin)   radius check                                radius check + sink
//! ```
//!
//! ## Modules
//! - `geo`: haversine distance and radius checks
//! - `location`: one-shot, timeout-bounded position queries
//! - `camera`: exclusive camera access and captured evidence
//! - `task`: the per-step workflow engine
//! - `progress`: clients that record completed steps
//! - `catalog`: quests, venues and items
//! - `venue`: shop and hospital access
//! - `client`: the player-side stack built from `WorkflowConfig`
//! - `api`, `llm`: the marker service

pub mod api;
pub mod camera;
pub mod catalog;
pub mod client;
pub mod config;
pub mod geo;
pub mod llm;
pub mod location;
pub mod progress;
pub mod session;
pub mod task;
pub mod venue;

pub use client::QuestClient;
pub use config::{Config, WorkflowConfig};
pub use geo::{distance_meters, is_within_radius, Coordinate, ProximityRadius};
pub use task::{TaskDefinition, TaskWorkflow, WorkflowError};
