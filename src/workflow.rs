//! Check-in state machine.
//!
//! ```text
//! Dashboard --start_face--> FaceStep --face ok--> IdStep --id ok--> Success
//!     |                        ^  |                 ^  |
//!     +--------start_id--------|--|-----------------+  |
//!                              +--+ (rejected)      +--+ (rejected)
//! any --back/home--> Dashboard
//! ```
//!
//! A capture is split in two phases so the caller can keep handling
//! navigation while the remote check runs: [`WorkflowController::begin_capture`]
//! snapshots a frame and hands back a [`PendingVerification`]; once it
//! resolves, [`WorkflowController::apply`] feeds the result in. Every state
//! change bumps an epoch, and results stamped with an older epoch are dropped.
//!
//! Only one check may be outstanding. The slot travels with the
//! [`PendingVerification`] and its [`SettledVerification`], and is freed when
//! either is applied or dropped, so dropping a pending check cancels it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Local};
use rollcall_camera::{
    CameraSessionManager, Constraints, DeviceProvider, FrameCapturer, SessionCounters,
};
use uuid::Uuid;

use crate::api::{
    AttendanceStats, FaceVerificationResult, IdVerificationResult, VerificationKind,
    VerificationReply,
};
use crate::attendance::{AttendanceRecorder, StatsSource};
use crate::error::{WorkflowError, WorkflowResult};
use crate::verify::{FaceVerifier, IdVerifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Dashboard,
    Face,
    Id,
    Success,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Step::Dashboard => "dashboard",
            Step::Face => "face step",
            Step::Id => "ID step",
            Step::Success => "success",
        })
    }
}

/// Current step plus the results carried forward into it.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Dashboard,
    FaceStep,
    IdStep {
        /// Absent when the ID step was entered straight from the dashboard.
        face: Option<FaceVerificationResult>,
    },
    Success {
        face: Option<FaceVerificationResult>,
        id: IdVerificationResult,
        completed_at: DateTime<Local>,
    },
}

impl WorkflowState {
    pub fn step(&self) -> Step {
        match self {
            WorkflowState::Dashboard => Step::Dashboard,
            WorkflowState::FaceStep => Step::Face,
            WorkflowState::IdStep { .. } => Step::Id,
            WorkflowState::Success { .. } => Step::Success,
        }
    }

    pub fn face_result(&self) -> Option<&FaceVerificationResult> {
        match self {
            WorkflowState::IdStep { face } | WorkflowState::Success { face, .. } => face.as_ref(),
            _ => None,
        }
    }

    pub fn id_result(&self) -> Option<&IdVerificationResult> {
        match self {
            WorkflowState::Success { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Identifies the step a verification was issued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
    step: Step,
}

impl Ticket {
    pub fn step(&self) -> Step {
        self.step
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Face(FaceVerificationResult),
    Id(IdVerificationResult),
}

/// Claim on the controller's single verification slot.
#[derive(Debug)]
struct SlotGuard(Arc<AtomicBool>);

impl SlotGuard {
    fn claim(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(busy)))
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An in-flight remote check. Await it, then pass the result to
/// [`WorkflowController::apply`]. Dropping it cancels the check.
pub struct PendingVerification {
    ticket: Ticket,
    request: Pin<Box<dyn Future<Output = Outcome> + Send>>,
    slot: Option<SlotGuard>,
}

impl PendingVerification {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl Future for PendingVerification {
    type Output = SettledVerification;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let outcome = match self.request.as_mut().poll(cx) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => return Poll::Pending,
        };
        Poll::Ready(SettledVerification {
            ticket: self.ticket,
            outcome,
            slot: self.slot.take(),
        })
    }
}

#[derive(Debug)]
pub struct SettledVerification {
    pub ticket: Ticket,
    pub outcome: Outcome,
    slot: Option<SlotGuard>,
}

/// What applying a settled verification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced(Step),
    /// Rejected; the step stays put for a recapture.
    Stayed,
    /// Arrived for a step that has since been left.
    Discarded,
}

/// Remote and device collaborators of the controller.
#[derive(Clone)]
pub struct Collaborators {
    pub camera: Arc<dyn DeviceProvider>,
    pub face: Arc<FaceVerifier>,
    pub id: Arc<IdVerifier>,
    pub recorder: AttendanceRecorder,
    pub stats: Arc<dyn StatsSource>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    pub constraints: Constraints,
    pub jpeg_quality: u8,
    /// Dashboard numbers shown until the first successful stats read.
    pub initial_stats: AttendanceStats,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            constraints: Constraints::new(640, 480),
            jpeg_quality: rollcall_camera::capture::DEFAULT_JPEG_QUALITY,
            initial_stats: AttendanceStats::default(),
        }
    }
}

pub struct WorkflowController {
    state: WorkflowState,
    epoch: u64,
    in_flight: Option<Ticket>,
    busy: Arc<AtomicBool>,
    message: Option<String>,
    run_id: Option<Uuid>,
    stats: AttendanceStats,
    camera: CameraSessionManager,
    capturer: FrameCapturer,
    constraints: Constraints,
    face: Arc<FaceVerifier>,
    id: Arc<IdVerifier>,
    recorder: AttendanceRecorder,
    stats_source: Arc<dyn StatsSource>,
}

impl WorkflowController {
    pub fn new(deps: Collaborators, options: WorkflowOptions) -> Self {
        Self {
            state: WorkflowState::Dashboard,
            epoch: 0,
            in_flight: None,
            busy: Arc::new(AtomicBool::new(false)),
            message: None,
            run_id: None,
            stats: options.initial_stats,
            camera: CameraSessionManager::new(deps.camera),
            capturer: FrameCapturer::new(options.jpeg_quality),
            constraints: options.constraints,
            face: deps.face,
            id: deps.id,
            recorder: deps.recorder,
            stats_source: deps.stats,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    /// Latest user-facing status line for the current step.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn stats(&self) -> &AttendanceStats {
        &self.stats
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    pub fn camera_active(&self) -> bool {
        self.camera.is_active()
    }

    pub fn camera_counters(&self) -> SessionCounters {
        self.camera.counters()
    }

    /// True while a check issued from the current step is outstanding.
    pub fn is_processing(&self) -> bool {
        self.busy.load(Ordering::Acquire) && self.in_flight.is_some_and(|t| t.epoch == self.epoch)
    }

    /// Dashboard entry on startup.
    pub async fn start(&mut self) {
        self.refresh_stats().await;
    }

    /// Best-effort stats read; a failure keeps the last-known values.
    pub async fn refresh_stats(&mut self) -> bool {
        match self.stats_source.fetch_stats().await {
            Ok(stats) => {
                self.stats = stats;
                true
            }
            Err(err) => {
                log::warn!("stats unavailable, keeping last-known values: {}", err);
                false
            }
        }
    }

    pub async fn start_face(&mut self) -> WorkflowResult<()> {
        self.require(Step::Dashboard, "start face verification")?;
        self.run_id = Some(Uuid::new_v4());
        self.enter(WorkflowState::FaceStep);
        self.open_camera().await
    }

    /// Enter the ID step directly, with no face result carried.
    pub async fn start_id(&mut self) -> WorkflowResult<()> {
        self.require(Step::Dashboard, "start ID verification")?;
        self.run_id = Some(Uuid::new_v4());
        self.enter(WorkflowState::IdStep { face: None });
        self.open_camera().await
    }

    /// Retry camera acquisition after a device error.
    pub async fn reopen_camera(&mut self) -> WorkflowResult<()> {
        match self.step() {
            Step::Face | Step::Id => self.open_camera().await,
            step => Err(WorkflowError::InvalidTransition {
                action: "open the camera",
                step,
            }),
        }
    }

    /// Return to the dashboard from anywhere, dropping carried results.
    pub async fn go_home(&mut self) {
        if self.step() != Step::Dashboard {
            self.camera.release();
            self.enter(WorkflowState::Dashboard);
            self.run_id = None;
        }
        self.refresh_stats().await;
    }

    pub async fn back(&mut self) {
        self.go_home().await
    }

    /// Snapshot a frame and start the remote check for the current step.
    pub async fn begin_capture(&mut self) -> WorkflowResult<PendingVerification> {
        let step = self.step();
        if !matches!(step, Step::Face | Step::Id) {
            return Err(WorkflowError::InvalidTransition {
                action: "capture",
                step,
            });
        }
        if self.busy.load(Ordering::Acquire) {
            return Err(WorkflowError::Busy);
        }
        let session = self.camera.session().ok_or(WorkflowError::NoSession)?;
        let image = match self.capturer.capture(session).await {
            Ok(image) => image,
            Err(err) => {
                log::warn!("capture failed on {}: {}", step, err);
                self.message = Some(format!("Camera not ready, try again ({err})"));
                return Err(err.into());
            }
        };

        let ticket = Ticket {
            epoch: self.epoch,
            step,
        };
        let request: Pin<Box<dyn Future<Output = Outcome> + Send>> = match step {
            Step::Face => {
                let verifier = Arc::clone(&self.face);
                Box::pin(async move { Outcome::Face(verifier.verify(image).await) })
            }
            _ => {
                let verifier = Arc::clone(&self.id);
                Box::pin(async move { Outcome::Id(verifier.verify(image).await) })
            }
        };
        let slot = SlotGuard::claim(&self.busy).ok_or(WorkflowError::Busy)?;
        self.in_flight = Some(ticket);
        self.message = Some("Processing...".to_string());
        Ok(PendingVerification {
            ticket,
            request,
            slot: Some(slot),
        })
    }

    /// Feed a settled verification back into the state machine.
    pub async fn apply(&mut self, settled: SettledVerification) -> Transition {
        let SettledVerification {
            ticket,
            outcome,
            slot,
        } = settled;
        drop(slot);
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
        if ticket.epoch != self.epoch {
            log::debug!(
                "discarding stale result from {} (epoch {} < {})",
                ticket.step,
                ticket.epoch,
                self.epoch
            );
            return Transition::Discarded;
        }

        match (outcome, self.step()) {
            (Outcome::Face(face), Step::Face) => self.apply_face(face).await,
            (Outcome::Id(id), Step::Id) => self.apply_id(id).await,
            (_, step) => {
                log::debug!("discarding result that does not belong to {}", step);
                Transition::Discarded
            }
        }
    }

    /// Both capture phases back to back.
    pub async fn capture_and_verify(&mut self) -> WorkflowResult<Transition> {
        let pending = self.begin_capture().await?;
        let settled = pending.await;
        Ok(self.apply(settled).await)
    }

    /// Release the camera on teardown. Also happens on drop.
    pub fn shutdown(&mut self) {
        self.camera.release();
    }

    async fn apply_face(&mut self, face: FaceVerificationResult) -> Transition {
        if !face.is_success() {
            self.message = Some(rejection(VerificationKind::Face, face.message()));
            return Transition::Stayed;
        }
        let mut message = face.message.clone();
        if let Some(confidence) = face.confidence {
            message.push_str(&format!(" (Confidence: {confidence}%)"));
        }

        self.camera.release();
        self.enter(WorkflowState::IdStep { face: Some(face) });
        self.message = Some(message);
        // A device error here leaves us on the ID step with the message set.
        if let Err(err) = self.open_camera().await {
            log::debug!("ID step entered without a camera: {}", err);
        }
        Transition::Advanced(Step::Id)
    }

    async fn apply_id(&mut self, id: IdVerificationResult) -> Transition {
        if !id.is_success() {
            self.message = Some(rejection(VerificationKind::Id, id.message()));
            return Transition::Stayed;
        }
        let face = match &mut self.state {
            WorkflowState::IdStep { face } => face.take(),
            _ => None,
        };

        self.camera.release();
        if let Err(err) = self.recorder.record(face.as_ref(), &id).await {
            log::warn!("attendance recording failed: {}", err);
        }
        self.enter(WorkflowState::Success {
            face,
            id,
            completed_at: Local::now(),
        });
        self.message = Some("Attendance recorded successfully!".to_string());
        Transition::Advanced(Step::Success)
    }

    async fn open_camera(&mut self) -> WorkflowResult<()> {
        match self.camera.acquire(&self.constraints).await {
            Ok(_) => Ok(()),
            Err(err) => {
                log::error!("camera unavailable on {}: {}", self.step(), err);
                self.message = Some(format!(
                    "Failed to access camera ({err}). Please grant camera permissions."
                ));
                Err(err.into())
            }
        }
    }

    fn enter(&mut self, state: WorkflowState) {
        log::info!(
            "{} -> {} (run {})",
            self.step(),
            state.step(),
            self.run_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into())
        );
        self.state = state;
        self.epoch += 1;
        self.message = None;
    }

    fn require(&self, step: Step, action: &'static str) -> WorkflowResult<()> {
        let current = self.step();
        if current == step {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                action,
                step: current,
            })
        }
    }
}

fn rejection(kind: VerificationKind, message: &str) -> String {
    if message.is_empty() {
        kind.not_recognized().to_string()
    } else {
        message.to_string()
    }
}
