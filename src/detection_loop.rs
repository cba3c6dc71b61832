//! The detection loop state machine.
//!
//! While detecting, a fixed one-second timer captures the latest camera
//! frame, encodes it, posts it to the detection service and forwards the
//! guidance to the status line and the notification policy.
//!
//! Overlap policy: ticks are dropped while a request is in flight. The tick
//! guard turns busy right before a request is issued and ready again when it
//! completes, so at most one request is ever outstanding.
//!
//! Cancellation: `stop` bumps an epoch. A request that completes after a stop
//! carries the old epoch and its result is discarded, so a late answer can
//! never put the loop back into `Detecting`.

use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::actions::UserAction;
use crate::camera::{CameraError, CameraFacing, CaptureSource};
use crate::detection::{DetectionClient, DetectionError, DetectionResult};
use crate::encoder::{DetectionRequest, FrameEncoder};
use crate::notify::{Cues, NotificationPolicy, NotifyOutcome};
use crate::status::{Status, StatusSink};

/// Period between ticks while detecting.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Shortest accepted tick period. `tokio::time::interval` rejects zero.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

pub const STATUS_STARTING_CAMERA: &str = "Starting camera...";
pub const STATUS_CAMERA_READY: &str = "Camera started. Ready to detect.";
pub const STATUS_CAMERA_FAILED: &str = "Could not access camera.";
pub const STATUS_DETECTING: &str = "Detection active...";
pub const STATUS_STOPPED: &str = "Detection stopped.";
pub const STATUS_CONNECTION_ERROR: &str = "Connection error.";
pub const STATUS_ENCODE_ERROR: &str = "Could not encode frame.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Detecting,
}

/// Whether a new request may be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickGuard {
    Ready,
    Busy,
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotDetecting,
    NoSession,
    InFlight,
    NoFrame,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    /// Guidance reached the status line; the notification may have been deduped.
    Delivered(NotifyOutcome),
    /// The exchange failed and detection was stopped.
    Failed,
    /// The answer arrived after detection was stopped and was dropped.
    Discarded,
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("No camera session. Start the camera first")]
    NoSession,

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// A request that passed the tick guard and is ready to be sent.
#[derive(Debug)]
pub struct PendingTick {
    epoch: u64,
    request: DetectionRequest,
}

impl PendingTick {
    pub fn request(&self) -> &DetectionRequest {
        &self.request
    }

    /// Perform the exchange. The returned future owns everything it needs,
    /// so the loop stays free to handle user actions meanwhile.
    pub fn send(self, client: DetectionClient) -> LocalBoxFuture<'static, TickCompletion> {
        Box::pin(async move {
            let result = client.send(&self.request).await;
            TickCompletion {
                epoch: self.epoch,
                result,
            }
        })
    }
}

/// A finished exchange, tagged with the epoch it was issued in.
#[derive(Debug)]
pub struct TickCompletion {
    pub epoch: u64,
    pub result: Result<DetectionResult, DetectionError>,
}

/// Owns the camera, the timer state and the collaborators.
pub struct DetectionLoop {
    camera: CaptureSource,
    encoder: FrameEncoder,
    client: DetectionClient,
    notifier: NotificationPolicy,
    status: Box<dyn StatusSink>,
    cues: Option<Box<dyn Cues>>,
    state: LoopState,
    guard: TickGuard,
    facing: CameraFacing,
    epoch: u64,
    tick_period: Duration,
}

impl DetectionLoop {
    pub fn new(camera: CaptureSource, client: DetectionClient, status: Box<dyn StatusSink>) -> Self {
        Self {
            camera,
            encoder: FrameEncoder::new(),
            client,
            notifier: NotificationPolicy::silent(),
            status,
            cues: None,
            state: LoopState::Idle,
            guard: TickGuard::Ready,
            facing: CameraFacing::default(),
            epoch: 0,
            tick_period: TICK_PERIOD,
        }
    }

    pub fn with_notifier(mut self, notifier: NotificationPolicy) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_cues(mut self, cues: Option<Box<dyn Cues>>) -> Self {
        self.cues = cues;
        self
    }

    /// Facing used by the first `GetStarted`.
    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.facing = facing;
        self
    }

    /// Periods below [`MIN_TICK_PERIOD`] are raised to it.
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period.max(MIN_TICK_PERIOD);
        self
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_detecting(&self) -> bool {
        self.state == LoopState::Detecting
    }

    pub fn guard(&self) -> TickGuard {
        self.guard
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn camera(&self) -> &CaptureSource {
        &self.camera
    }

    pub fn last_spoken(&self) -> &str {
        self.notifier.last_spoken()
    }

    /// Open the camera for `facing`.
    ///
    /// Failure is terminal for this attempt: the error is shown, no session
    /// is installed and detection cannot start.
    pub fn start_camera(&mut self, facing: CameraFacing) -> Result<(), LoopError> {
        self.set_status(Status::neutral(STATUS_STARTING_CAMERA));
        self.facing = facing;

        match self.camera.acquire(facing).map(|session| session.mirrored()) {
            Ok(mirrored) => {
                log::info!("Camera started ({}, mirrored: {})", facing, mirrored);
                self.set_status(Status::neutral(STATUS_CAMERA_READY));
                Ok(())
            }
            Err(e) => {
                log::warn!("Error starting camera: {}", e);
                if self.is_detecting() {
                    self.halt();
                }
                self.set_status(Status::error(STATUS_CAMERA_FAILED));
                Err(e.into())
            }
        }
    }

    /// Idle -> Detecting. Requires a camera session; no-op when already detecting.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if self.is_detecting() {
            return Ok(());
        }
        if !self.camera.is_live() {
            log::warn!("Cannot start detection without a camera session");
            return Err(LoopError::NoSession);
        }

        self.state = LoopState::Detecting;
        log::info!("Detection started");
        self.set_status(Status::live(STATUS_DETECTING));
        Ok(())
    }

    /// Detecting -> Idle. Idempotent.
    pub fn stop(&mut self) {
        if !self.is_detecting() {
            return;
        }
        self.halt();
        self.set_status(Status::neutral(STATUS_STOPPED));
    }

    pub fn toggle_detection(&mut self) -> Result<(), LoopError> {
        if self.is_detecting() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// Release the camera, stop detection and reopen with `facing`.
    ///
    /// Detection is not resumed afterwards.
    pub fn switch_camera(&mut self, facing: CameraFacing) -> Result<(), LoopError> {
        self.camera.release();
        self.stop();
        self.start_camera(facing)
    }

    /// Switch to whichever camera is not current.
    pub fn switch_to_other_camera(&mut self) -> Result<(), LoopError> {
        self.switch_camera(self.facing.toggled())
    }

    /// Map a user action onto a transition. `Quit` stops everything.
    pub fn dispatch(&mut self, action: UserAction) -> Result<(), LoopError> {
        log::debug!("Action: {:?}", action);
        if let Some(cues) = self.cues.as_mut() {
            cues.click();
        }

        match action {
            UserAction::GetStarted => self.start_camera(self.facing),
            UserAction::ToggleDetection => self.toggle_detection(),
            UserAction::Start => self.start(),
            UserAction::Stop => {
                self.stop();
                Ok(())
            }
            UserAction::SwitchCamera => self.switch_to_other_camera(),
            UserAction::Quit => {
                self.shutdown();
                Ok(())
            }
        }
    }

    /// First half of a tick: check the guard, capture and encode.
    ///
    /// On success the guard is busy until [`complete_tick`](Self::complete_tick)
    /// is called with the matching completion.
    pub fn begin_tick(&mut self) -> Result<PendingTick, TickOutcome> {
        if !self.is_detecting() {
            return Err(TickOutcome::Skipped(SkipReason::NotDetecting));
        }
        let Some(session) = self.camera.session() else {
            return Err(TickOutcome::Skipped(SkipReason::NoSession));
        };
        if self.guard == TickGuard::Busy {
            log::debug!("Previous detection still in flight, dropping tick");
            return Err(TickOutcome::Skipped(SkipReason::InFlight));
        }

        let mirrored = session.mirrored();
        let Some(frame) = session.frame() else {
            log::debug!("No camera frame yet, skipping tick");
            return Err(TickOutcome::Skipped(SkipReason::NoFrame));
        };

        let request = match self.encoder.encode(&frame, mirrored) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Error encoding frame: {}", e);
                self.set_status(Status::error(STATUS_ENCODE_ERROR));
                self.halt();
                return Err(TickOutcome::Failed);
            }
        };

        self.guard = TickGuard::Busy;
        self.status.set_busy(true);
        Ok(PendingTick {
            epoch: self.epoch,
            request,
        })
    }

    /// Second half of a tick: apply the answer, or stop on failure.
    pub fn complete_tick(&mut self, completion: TickCompletion) -> TickOutcome {
        self.guard = TickGuard::Ready;

        if completion.epoch != self.epoch || !self.is_detecting() {
            log::debug!("Discarding detection result from a stopped run");
            return TickOutcome::Discarded;
        }
        self.status.set_busy(false);

        match completion.result {
            Ok(result) => {
                self.set_status(Status::live(result.display_text()));
                let notified = self.notifier.notify(result.spoken_text());
                if notified == NotifyOutcome::Emitted {
                    if let Some(cues) = self.cues.as_mut() {
                        cues.alert();
                    }
                }
                TickOutcome::Delivered(notified)
            }
            Err(e) => {
                log::warn!("Error sending frame: {}", e);
                self.set_status(Status::error(STATUS_CONNECTION_ERROR));
                self.halt();
                TickOutcome::Failed
            }
        }
    }

    /// One full tick, awaiting the exchange in place.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.begin_tick() {
            Ok(pending) => {
                let completion = pending.send(self.client.clone()).await;
                self.complete_tick(completion)
            }
            Err(outcome) => outcome,
        }
    }

    /// Drive the loop until `Quit` or until the action channel closes.
    ///
    /// A single task multiplexes user actions, the tick timer (polled only
    /// while detecting) and the in-flight request.
    pub async fn run(&mut self, mut actions: mpsc::UnboundedReceiver<UserAction>) {
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<LocalBoxFuture<'static, TickCompletion>> = None;

        loop {
            tokio::select! {
                action = actions.recv() => {
                    let action = match action {
                        Some(UserAction::Quit) | None => break,
                        Some(action) => action,
                    };
                    let was_detecting = self.is_detecting();
                    if let Err(e) = self.dispatch(action) {
                        log::warn!("{:?} failed: {}", action, e);
                    }
                    if !was_detecting && self.is_detecting() {
                        // First tick one full period after start
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if self.is_detecting() => {
                    if let Ok(pending) = self.begin_tick() {
                        in_flight = Some(pending.send(self.client.clone()));
                    }
                }
                completion = next_completion(&mut in_flight) => {
                    in_flight = None;
                    self.complete_tick(completion);
                }
            }
        }

        self.shutdown();
    }

    /// Stop detecting and release the camera.
    fn shutdown(&mut self) {
        self.stop();
        self.camera.release();
    }

    fn halt(&mut self) {
        self.state = LoopState::Idle;
        self.epoch += 1;
        self.status.set_busy(false);
        log::info!("Detection stopped");
    }

    fn set_status(&mut self, status: Status) {
        log::debug!("Status: {}", status.message);
        self.status.update(&status);
    }
}

/// Resolves with the in-flight completion, or never if nothing is in flight.
async fn next_completion(
    in_flight: &mut Option<LocalBoxFuture<'static, TickCompletion>>,
) -> TickCompletion {
    match in_flight {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}
