//! Per-step state.
//!
//! # State Machine
//! ```text
//! NotStarted -> AwaitingArrival -> ArrivedAwaitingEvidence -> Completed
//!      ^              |                      |
//!      +--------------+----------------------+   (cancel, location failure)
//! ```

use serde::Serialize;

use crate::camera::EvidenceCapture;
use crate::location::PositionReading;
use crate::progress::CompletionReceipt;

/// State of one step, with the data each phase owns.
#[derive(Debug, Clone, Default)]
pub enum StepState {
    #[default]
    NotStarted,
    /// Travelling. `origin` is where the player was when they started.
    AwaitingArrival { origin: Option<PositionReading> },
    /// On site. Evidence is optional until submission.
    ArrivedAwaitingEvidence {
        arrival: PositionReading,
        evidence: Option<EvidenceCapture>,
    },
    Completed { receipt: CompletionReceipt },
}

impl StepState {
    pub fn phase(&self) -> StepPhase {
        match self {
            StepState::NotStarted => StepPhase::NotStarted,
            StepState::AwaitingArrival { .. } => StepPhase::AwaitingArrival,
            StepState::ArrivedAwaitingEvidence { .. } => StepPhase::ArrivedAwaitingEvidence,
            StepState::Completed { .. } => StepPhase::Completed,
        }
    }

    pub fn evidence(&self) -> Option<&EvidenceCapture> {
        match self {
            StepState::ArrivedAwaitingEvidence { evidence, .. } => evidence.as_ref(),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepState::Completed { .. })
    }
}

/// Data-free view of [`StepState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    NotStarted,
    AwaitingArrival,
    ArrivedAwaitingEvidence,
    Completed,
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepPhase::NotStarted => write!(f, "not started"),
            StepPhase::AwaitingArrival => write!(f, "awaiting arrival"),
            StepPhase::ArrivedAwaitingEvidence => write!(f, "awaiting photo evidence"),
            StepPhase::Completed => write!(f, "completed"),
        }
    }
}

/// Player actions that move a step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Start,
    ConfirmArrival,
    OpenCamera,
    Capture,
    Submit,
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepAction::Start => write!(f, "start"),
            StepAction::ConfirmArrival => write!(f, "confirm arrival"),
            StepAction::OpenCamera => write!(f, "open the camera"),
            StepAction::Capture => write!(f, "take a photo"),
            StepAction::Submit => write!(f, "submit"),
        }
    }
}
