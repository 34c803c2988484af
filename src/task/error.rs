//! Workflow errors, each with the message shown to the player.

use thiserror::Error;

use super::{StepAction, StepPhase};
use crate::camera::CameraError;
use crate::location::LocationError;
use crate::progress::SubmitError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Step {0} does not exist in this task.")]
    UnknownStep(usize),

    #[error("Step {0} is already completed.")]
    AlreadyCompleted(usize),

    #[error("Cannot {action} while step {step} is {phase}.")]
    InvalidTransition {
        step: usize,
        phase: StepPhase,
        action: StepAction,
    },

    /// Another action on the same step is still outstanding.
    #[error("Still working on '{action}' for step {step}. Please wait.")]
    Busy { step: usize, action: StepAction },

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("You are not close enough to the location yet! ({distance_meters:.0} m away, must be within {radius_meters:.0} m)")]
    NotCloseEnough {
        distance_meters: f64,
        radius_meters: f64,
    },

    #[error("You are not at the correct location for this task. ({distance_meters:.0} m away, must be within {radius_meters:.0} m) Return and take a new photo.")]
    MovedAway {
        distance_meters: f64,
        radius_meters: f64,
    },

    #[error("No image captured. Please take a photo first.")]
    NoEvidence,

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("Upload failed, try again. {0}")]
    Submission(#[from] SubmitError),

    /// The step was cancelled or replaced while this action was outstanding.
    #[error("Step {0} was cancelled.")]
    Cancelled(usize),
}

impl WorkflowError {
    /// Whether the player can simply try the same action again.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Location(e) => e.is_retryable(),
            WorkflowError::Submission(e) => e.is_retryable(),
            WorkflowError::NotCloseEnough { .. }
            | WorkflowError::MovedAway { .. }
            | WorkflowError::NoEvidence
            | WorkflowError::Busy { .. } => true,
            WorkflowError::Camera(e) => !matches!(
                e,
                CameraError::Unsupported | CameraError::PermissionDenied
            ),
            WorkflowError::UnknownStep(_)
            | WorkflowError::AlreadyCompleted(_)
            | WorkflowError::InvalidTransition { .. }
            | WorkflowError::Cancelled(_) => false,
        }
    }
}
