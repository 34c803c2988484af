//! Location-verified task workflow.
//!
//! A task (a quest, or picking up an item) is an ordered list of
//! [`TaskLocation`]s. Each location is one step the player completes by
//! travelling there, confirming arrival, photographing it and submitting the
//! photo. [`TaskWorkflow`] drives those steps; [`StepState`] is the per-step
//! state machine.

mod error;
mod state;
mod workflow;

pub use error::WorkflowError;
pub use state::{StepAction, StepPhase, StepState};
pub use workflow::{TaskProgress, TaskWorkflow};

use serde::{Deserialize, Serialize};

use crate::catalog::TaskLocation;
use crate::geo::ProximityRadius;

/// What completing the task records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Quest progress
    Quest,
    /// Inventory acquisition
    Item,
}

/// Immutable description of a task the workflow runs over.
///
/// # Invariants
/// - `locations` is non-empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDefinition {
    pub id: String,
    pub kind: TaskKind,
    pub title: String,
    pub locations: Vec<TaskLocation>,
    pub radius: ProximityRadius,
    /// Awarded once every step is complete.
    pub reward_points: u32,
}
