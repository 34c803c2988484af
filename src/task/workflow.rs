//! The task workflow engine.
//!
//! # Invariants
//! - At most one step is active (not `NotStarted`/`Completed`) at a time.
//! - A step has at most one action in flight; others are rejected as `Busy`.
//! - `Completed` is only entered after a passing proximity check taken during
//!   that submission and an acknowledged persistence call.
//! - Results arriving for a cancelled or replaced activation are dropped.
//!
//! The state lock is never held across a device or network call.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{StepAction, StepPhase, StepState, TaskDefinition, WorkflowError};
use crate::camera::{Camera, CameraError, CameraSession, EvidenceCapture};
use crate::catalog::TaskLocation;
use crate::geo::ProximityCheck;
use crate::location::{PositionProvider, PositionReading};
use crate::progress::{CompletionReceipt, CompletionSink, CompletionSubmission};
use crate::session::Session;

/// The step currently being worked on.
struct Activation {
    step: usize,
    generation: u64,
    cancel: CancellationToken,
    in_flight: Option<StepAction>,
    camera: Option<CameraSession>,
}

impl Drop for Activation {
    fn drop(&mut self) {
        // Stops anything still awaiting on behalf of this activation.
        self.cancel.cancel();
    }
}

/// Identifies the activation an outstanding action belongs to.
struct Ticket {
    step: usize,
    generation: u64,
    cancel: CancellationToken,
}

struct Inner {
    steps: Vec<StepState>,
    active: Option<Activation>,
    generation: u64,
}

impl Inner {
    fn phase(&self, step: usize) -> Result<StepPhase, WorkflowError> {
        self.steps
            .get(step)
            .map(StepState::phase)
            .ok_or(WorkflowError::UnknownStep(step))
    }

    /// Check that `action` may run now on `step`, which must be active and in
    /// `expected`.
    fn check(
        &self,
        step: usize,
        action: StepAction,
        expected: StepPhase,
    ) -> Result<(), WorkflowError> {
        let phase = self.phase(step)?;
        if phase == StepPhase::Completed {
            return Err(WorkflowError::AlreadyCompleted(step));
        }
        let active = match &self.active {
            Some(active) if active.step == step => active,
            _ => {
                return Err(WorkflowError::InvalidTransition {
                    step,
                    phase,
                    action,
                })
            }
        };
        if let Some(current) = active.in_flight {
            return Err(WorkflowError::Busy {
                step,
                action: current,
            });
        }
        if phase != expected {
            return Err(WorkflowError::InvalidTransition {
                step,
                phase,
                action,
            });
        }
        Ok(())
    }

    /// Mark `action` in flight on the active step. Call after [`Inner::check`].
    fn begin(&mut self, action: StepAction) -> Option<Ticket> {
        let active = self.active.as_mut()?;
        active.in_flight = Some(action);
        Some(Ticket {
            step: active.step,
            generation: active.generation,
            cancel: active.cancel.clone(),
        })
    }

    /// Fails with `Cancelled` if the ticket's activation is gone, then clears
    /// the in-flight marker.
    fn finish(&mut self, ticket: &Ticket) -> Result<(), WorkflowError> {
        match self.active.as_mut() {
            Some(active) if active.generation == ticket.generation => {
                active.in_flight = None;
                Ok(())
            }
            _ => Err(WorkflowError::Cancelled(ticket.step)),
        }
    }

    /// Drop the active step back to `NotStarted`, releasing its evidence and
    /// camera and cancelling anything it was waiting on.
    fn deactivate(&mut self) -> Option<usize> {
        let active = self.active.take()?;
        let step = active.step;
        if let Some(state) = self.steps.get_mut(step) {
            if !state.is_completed() {
                *state = StepState::NotStarted;
            }
        }
        Some(step)
    }

    fn activate(&mut self, step: usize) -> Ticket {
        self.generation += 1;
        let cancel = CancellationToken::new();
        self.active = Some(Activation {
            step,
            generation: self.generation,
            cancel: cancel.clone(),
            in_flight: Some(StepAction::Start),
            camera: None,
        });
        self.steps[step] = StepState::AwaitingArrival { origin: None };
        Ticket {
            step,
            generation: self.generation,
            cancel,
        }
    }

    fn active_mut(&mut self, step: usize) -> Option<&mut Activation> {
        self.active.as_mut().filter(|a| a.step == step)
    }
}

/// Snapshot of a task's progress for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub task_id: String,
    pub phases: Vec<StepPhase>,
    pub active_step: Option<usize>,
    /// Outstanding call on the active step, if any.
    pub in_flight: Option<StepAction>,
    pub all_done: bool,
    pub reward_points_earned: u32,
}

/// Drives the steps of one task for one player.
///
/// Methods take `&self`; share the workflow behind an `Arc` when actions can
/// be triggered from several places.
pub struct TaskWorkflow {
    definition: TaskDefinition,
    positions: PositionProvider,
    sink: Arc<dyn CompletionSink>,
    session: Session,
    camera: Option<Camera>,
    inner: Mutex<Inner>,
}

impl TaskWorkflow {
    pub fn new(
        definition: TaskDefinition,
        positions: PositionProvider,
        sink: Arc<dyn CompletionSink>,
        session: Session,
    ) -> Self {
        let steps = definition
            .locations
            .iter()
            .map(|_| StepState::NotStarted)
            .collect();
        Self {
            definition,
            positions,
            sink,
            session,
            camera: None,
            inner: Mutex::new(Inner {
                steps,
                active: None,
                generation: 0,
            }),
        }
    }

    /// Enable in-app photo capture.
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn definition(&self) -> &TaskDefinition {
        &self.definition
    }

    pub fn location(&self, step: usize) -> Result<&TaskLocation, WorkflowError> {
        self.definition
            .locations
            .get(step)
            .ok_or(WorkflowError::UnknownStep(step))
    }

    pub async fn phase(&self, step: usize) -> Result<StepPhase, WorkflowError> {
        self.inner.lock().await.phase(step)
    }

    /// Current state of `step`, including any held evidence.
    pub async fn state(&self, step: usize) -> Result<StepState, WorkflowError> {
        self.inner
            .lock()
            .await
            .steps
            .get(step)
            .cloned()
            .ok_or(WorkflowError::UnknownStep(step))
    }

    pub async fn progress(&self) -> TaskProgress {
        let inner = self.inner.lock().await;
        let phases: Vec<StepPhase> = inner.steps.iter().map(StepState::phase).collect();
        let all_done = phases.iter().all(|p| *p == StepPhase::Completed);
        TaskProgress {
            task_id: self.definition.id.clone(),
            active_step: inner.active.as_ref().map(|a| a.step),
            in_flight: inner.active.as_ref().and_then(|a| a.in_flight),
            reward_points_earned: if all_done {
                self.definition.reward_points
            } else {
                0
            },
            all_done,
            phases,
        }
    }

    /// `NotStarted -> AwaitingArrival`.
    ///
    /// Any other active step is reset first. Returns the starting position
    /// (route origin). A location failure leaves the step `NotStarted`.
    pub async fn start(&self, step: usize) -> Result<PositionReading, WorkflowError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            let phase = inner.phase(step)?;
            if phase == StepPhase::Completed {
                return Err(WorkflowError::AlreadyCompleted(step));
            }
            if let Some(active) = &inner.active {
                if active.step == step {
                    return Err(match active.in_flight {
                        Some(current) => WorkflowError::Busy {
                            step,
                            action: current,
                        },
                        None => WorkflowError::InvalidTransition {
                            step,
                            phase,
                            action: StepAction::Start,
                        },
                    });
                }
            }
            if let Some(previous) = inner.deactivate() {
                tracing::info!(
                    task_id = %self.definition.id,
                    previous_step = previous,
                    step,
                    "Switching active step"
                );
            }
            inner.activate(step)
        };

        tracing::info!(task_id = %self.definition.id, step, "Step started");
        let result = self.locate(&ticket).await;

        let mut inner = self.inner.lock().await;
        inner.finish(&ticket)?;
        match result {
            Ok(origin) => {
                inner.steps[step] = StepState::AwaitingArrival {
                    origin: Some(origin),
                };
                Ok(origin)
            }
            Err(err) => {
                self.abort(&mut inner, step, &err);
                Err(err)
            }
        }
    }

    /// `AwaitingArrival -> ArrivedAwaitingEvidence` when the player is within
    /// the radius of the step's location.
    pub async fn confirm_arrival(&self, step: usize) -> Result<ProximityCheck, WorkflowError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.check(step, StepAction::ConfirmArrival, StepPhase::AwaitingArrival)?;
            inner
                .begin(StepAction::ConfirmArrival)
                .ok_or(WorkflowError::Cancelled(step))?
        };

        let result = self.locate(&ticket).await;

        let mut inner = self.inner.lock().await;
        inner.finish(&ticket)?;
        let reading = match result {
            Ok(reading) => reading,
            Err(err) => {
                self.abort(&mut inner, step, &err);
                return Err(err);
            }
        };

        let check = self.proximity(step, &reading);
        if !check.within {
            tracing::info!(
                task_id = %self.definition.id,
                step,
                distance_m = check.distance_meters,
                "Arrival rejected"
            );
            return Err(WorkflowError::NotCloseEnough {
                distance_meters: check.distance_meters,
                radius_meters: check.radius_meters,
            });
        }

        inner.steps[step] = StepState::ArrivedAwaitingEvidence {
            arrival: reading,
            evidence: None,
        };
        tracing::info!(
            task_id = %self.definition.id,
            step,
            distance_m = check.distance_meters,
            "Arrival confirmed"
        );
        Ok(check)
    }

    /// Store evidence chosen outside the in-app camera (file picker).
    ///
    /// Closes the camera if it was open.
    pub async fn attach_evidence(
        &self,
        step: usize,
        evidence: EvidenceCapture,
    ) -> Result<(), WorkflowError> {
        if evidence.is_empty() {
            let reason = "the selected image is empty".to_string();
            return Err(CameraError::CaptureFailed(reason).into());
        }
        let mut inner = self.inner.lock().await;
        inner.check(step, StepAction::Capture, StepPhase::ArrivedAwaitingEvidence)?;
        if let Some(active) = inner.active_mut(step) {
            active.camera = None;
        }
        set_evidence(&mut inner.steps[step], Some(evidence));
        Ok(())
    }

    /// Open the camera for `step`. Opening an already open camera is a no-op.
    pub async fn open_camera(&self, step: usize) -> Result<(), WorkflowError> {
        let camera = self.camera.clone().ok_or(CameraError::Unsupported)?;
        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.check(step, StepAction::OpenCamera, StepPhase::ArrivedAwaitingEvidence)?;
            if inner.active_mut(step).is_some_and(|a| a.camera.is_some()) {
                return Ok(());
            }
            inner
                .begin(StepAction::OpenCamera)
                .ok_or(WorkflowError::Cancelled(step))?
        };

        let result = tokio::select! {
            _ = ticket.cancel.cancelled() => Err(WorkflowError::Cancelled(step)),
            session = camera.open() => session.map_err(WorkflowError::from),
        };

        let mut inner = self.inner.lock().await;
        // A session opened for a stale activation is dropped (and released) here.
        inner.finish(&ticket)?;
        let session = result?;
        if let Some(active) = inner.active_mut(step) {
            active.camera = Some(session);
        }
        Ok(())
    }

    /// Grab a frame from the open camera and release it.
    pub async fn take_photo(&self, step: usize) -> Result<EvidenceCapture, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.check(step, StepAction::Capture, StepPhase::ArrivedAwaitingEvidence)?;
        let session = inner
            .active_mut(step)
            .and_then(|a| a.camera.take())
            .ok_or_else(|| {
                CameraError::CaptureFailed(
                    "Camera not ready or stream unavailable for capture.".to_string(),
                )
            })?;
        let capture = session.capture()?;
        set_evidence(&mut inner.steps[step], Some(capture.clone()));
        tracing::debug!(
            task_id = %self.definition.id,
            step,
            bytes = capture.len(),
            "Photo captured"
        );
        Ok(capture)
    }

    /// Throw away the held photo; the step stays on site.
    pub async fn discard_evidence(&self, step: usize) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.check(step, StepAction::Capture, StepPhase::ArrivedAwaitingEvidence)?;
        set_evidence(&mut inner.steps[step], None);
        Ok(())
    }

    /// `ArrivedAwaitingEvidence -> Completed`.
    ///
    /// Re-checks proximity, then hands the evidence to the completion sink.
    /// Moving away discards the photo; a failed upload keeps it so the player
    /// can resubmit without walking back.
    pub async fn submit(&self, step: usize) -> Result<CompletionReceipt, WorkflowError> {
        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.check(step, StepAction::Submit, StepPhase::ArrivedAwaitingEvidence)?;
            if inner.steps[step].evidence().is_none() {
                return Err(WorkflowError::NoEvidence);
            }
            inner
                .begin(StepAction::Submit)
                .ok_or(WorkflowError::Cancelled(step))?
        };

        let located = self.locate(&ticket).await;

        let submission = {
            let mut inner = self.inner.lock().await;
            let reading = match located {
                Ok(reading) => reading,
                Err(err) => {
                    inner.finish(&ticket)?;
                    self.abort(&mut inner, step, &err);
                    return Err(err);
                }
            };
            if inner.active_mut(step).map(|a| a.generation) != Some(ticket.generation) {
                return Err(WorkflowError::Cancelled(step));
            }

            let check = self.proximity(step, &reading);
            if !check.within {
                inner.finish(&ticket)?;
                set_evidence(&mut inner.steps[step], None);
                tracing::info!(
                    task_id = %self.definition.id,
                    step,
                    distance_m = check.distance_meters,
                    "Submission rejected: player moved away"
                );
                return Err(WorkflowError::MovedAway {
                    distance_meters: check.distance_meters,
                    radius_meters: check.radius_meters,
                });
            }

            let evidence = match inner.steps[step].evidence() {
                Some(evidence) => evidence.clone(),
                None => {
                    inner.finish(&ticket)?;
                    return Err(WorkflowError::NoEvidence);
                }
            };
            CompletionSubmission {
                task_id: self.definition.id.clone(),
                kind: self.definition.kind,
                step,
                location_name: self.definition.locations[step].name.clone(),
                evidence,
                position: reading,
            }
        };

        let recorded = tokio::select! {
            _ = ticket.cancel.cancelled() => Err(WorkflowError::Cancelled(step)),
            result = self.sink.record(&self.session, &submission) => {
                result.map_err(WorkflowError::from)
            }
        };

        let mut inner = self.inner.lock().await;
        inner.finish(&ticket)?;
        match recorded {
            Ok(receipt) => {
                inner.steps[step] = StepState::Completed {
                    receipt: receipt.clone(),
                };
                inner.active = None;
                tracing::info!(task_id = %self.definition.id, step, "Step completed");
                if inner.steps.iter().all(StepState::is_completed) {
                    tracing::info!(
                        task_id = %self.definition.id,
                        reward_points = self.definition.reward_points,
                        "Task complete"
                    );
                }
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(task_id = %self.definition.id, step, "Submission failed: {}", err);
                Err(err)
            }
        }
    }

    /// Back to `NotStarted` from any open state, dropping evidence and camera.
    pub async fn cancel(&self, step: usize) -> Result<(), WorkflowError> {
        let mut inner = self.inner.lock().await;
        if inner.phase(step)? == StepPhase::Completed {
            return Err(WorkflowError::AlreadyCompleted(step));
        }
        if inner.active.as_ref().is_some_and(|a| a.step == step) {
            inner.deactivate();
            tracing::info!(task_id = %self.definition.id, step, "Step cancelled");
        }
        Ok(())
    }

    /// Reset every step, e.g. when the player switches to another task.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.active = None;
        for state in inner.steps.iter_mut() {
            *state = StepState::NotStarted;
        }
        tracing::info!(task_id = %self.definition.id, "Task reset");
    }

    async fn locate(&self, ticket: &Ticket) -> Result<PositionReading, WorkflowError> {
        tokio::select! {
            _ = ticket.cancel.cancelled() => Err(WorkflowError::Cancelled(ticket.step)),
            result = self.positions.current_position() => result.map_err(WorkflowError::from),
        }
    }

    fn proximity(&self, step: usize, reading: &PositionReading) -> ProximityCheck {
        ProximityCheck::evaluate(
            reading.coordinate,
            self.definition.locations[step].coordinate,
            self.definition.radius,
        )
    }

    fn abort(&self, inner: &mut Inner, step: usize, err: &WorkflowError) {
        tracing::warn!(task_id = %self.definition.id, step, "Step aborted: {}", err);
        inner.deactivate();
    }
}

fn set_evidence(state: &mut StepState, value: Option<EvidenceCapture>) {
    if let StepState::ArrivedAwaitingEvidence { evidence, .. } = state {
        *evidence = value;
    }
}
