//! Track logger - records the tracker's positions as a logging session.
//!
//! While armed, a background worker samples the latest position once per
//! interval, drops samples closer than the minimum distance to the last
//! accepted one, and appends the rest to the store, one transaction per
//! point.
//!
//! # Lifecycle
//!
//! ```text
//!            arm()               worker done
//! Disarmed ─────────► Armed ─────────────────► Disarmed
//!    ▲                  │  disarm()     ▲
//!    │                  └──► Disarming ─┘
//!    │                  │
//!    │  arm()           │ store error
//!    └───────────── Failed ◄┘
//! ```
//!
//! `arm()` and `disarm()` return promptly. The worker finalizes the session
//! itself once its in-flight iteration ends, so a point is never appended
//! after the session was closed or deleted. Sessions with fewer than two
//! points are deleted instead of closed.
//!
//! The logger reaches the tracker through the [`TrackerContext`] on every
//! iteration, so a tracker the platform stopped is restarted and sampling
//! resumes. Samples are only taken while the tracker reports a current fix.
//!
//! # Failures
//!
//! - Storage exhaustion: the session is abandoned and the user gets a prompt
//!   that stays until acknowledged. Committed points remain.
//! - Any other store error: the session is abandoned and the delayed
//!   prompt-then-alarm sequence is raised.
//! - A store error after `disarm()` was requested is reported the same way,
//!   but the session is still finalized and the logger ends Disarmed.
//! - Interrupted wait: logged and reported, sampling goes on. An interruption
//!   that arrives during an append ends the next wait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::alert::{raise_alarm, Acknowledgement, Alerter, DEFAULT_ALARM_DELAY};
use super::events::TrackLogEvent;
use super::session::{default_session_name, LogPoint, LoggingSession, SessionId};
use super::store::{PersistentTrackStore, StoreError};
use crate::config::SettingsProvider;
use crate::position::{
    PositionListener, PositionSample, PositionTracker, SourceError, TrackerContext,
};

/// Sessions with fewer accepted points are deleted on disarm.
pub const MIN_SESSION_POINTS: u64 = 2;

/// Track logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Delay before a write failure raises the prompt and alarm.
    pub alarm_delay: Duration,

    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            alarm_delay: DEFAULT_ALARM_DELAY,
            event_capacity: 64,
        }
    }
}

/// Logger state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggerPhase {
    #[default]
    Disarmed,
    Arming,
    Armed,
    Disarming,
    Failed,
}

/// Errors returned by [`TrackLogger::arm`].
#[derive(Debug, Error)]
pub enum TrackLogError {
    /// A session is still active.
    #[error("A logging session is already active ({0:?})")]
    AlreadyActive(LoggerPhase),

    /// The store refused to open a session.
    #[error("Failed to open logging session: {0}")]
    OpenSession(#[source] StoreError),

    /// The position tracker could not be started.
    #[error("Failed to start position tracking: {0}")]
    Tracker(#[source] SourceError),

    /// The worker needs a tokio runtime.
    #[error("Track logger must be armed from within a tokio runtime")]
    NoRuntime,
}

/// Listener half: copies the latest sample and returns.
#[derive(Default)]
struct LatestSample {
    sample: Mutex<Option<Arc<PositionSample>>>,
}

impl LatestSample {
    fn get(&self) -> Option<Arc<PositionSample>> {
        self.sample.lock().clone()
    }

    fn clear(&self) {
        self.sample.lock().take();
    }
}

impl PositionListener for LatestSample {
    fn on_position(&self, sample: &Arc<PositionSample>) {
        *self.sample.lock() = Some(Arc::clone(sample));
    }

    fn on_fix_status(&self, _has_fix: bool) {}
}

/// Mutable state shared between the handle and the worker.
#[derive(Default)]
struct LiveState {
    phase: LoggerPhase,
    session: Option<LoggingSession>,
    /// `(longitude, latitude)` of accepted points.
    track: Vec<(f64, f64)>,
    cancel: Option<CancellationToken>,
    /// Wakes the worker out of its wait; fresh per session.
    wake: Option<Arc<Notify>>,
    worker: Option<JoinHandle<()>>,
}

struct LoggerInner {
    context: Arc<TrackerContext>,
    store: Arc<dyn PersistentTrackStore>,
    settings: Arc<dyn SettingsProvider>,
    alerter: Arc<dyn Alerter>,
    config: LoggerConfig,
    latest: Arc<LatestSample>,
    state: Mutex<LiveState>,
    accepted: AtomicU64,
    /// `f64` bits of the cumulative distance.
    distance_bits: AtomicU64,
    events_tx: broadcast::Sender<TrackLogEvent>,
}

/// Parameters fixed for the lifetime of one session.
struct WorkerParams {
    session: SessionId,
    interval: Duration,
    minimum_distance: f64,
    cancel: CancellationToken,
    wake: Arc<Notify>,
}

enum WaitOutcome {
    Elapsed,
    Interrupted,
    Cancelled,
}

/// Records tracker positions into a persistent store.
///
/// Cheap to clone; clones control the same logger.
#[derive(Clone)]
pub struct TrackLogger {
    inner: Arc<LoggerInner>,
}

impl TrackLogger {
    /// Create a logger with default configuration.
    pub fn new(
        context: Arc<TrackerContext>,
        store: Arc<dyn PersistentTrackStore>,
        settings: Arc<dyn SettingsProvider>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        Self::with_config(context, store, settings, alerter, LoggerConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(
        context: Arc<TrackerContext>,
        store: Arc<dyn PersistentTrackStore>,
        settings: Arc<dyn SettingsProvider>,
        alerter: Arc<dyn Alerter>,
        config: LoggerConfig,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(LoggerInner {
                context,
                store,
                settings,
                alerter,
                config,
                latest: Arc::new(LatestSample::default()),
                state: Mutex::new(LiveState::default()),
                accepted: AtomicU64::new(0),
                distance_bits: AtomicU64::new(0f64.to_bits()),
                events_tx,
            }),
        }
    }

    /// Start a new logging session.
    ///
    /// Acquires the tracker, reads the sampling parameters, opens the
    /// session, subscribes and spawns the worker. Returns the new session id without
    /// waiting for any sample. `None` picks a name like
    /// `log_20240517_083005`.
    pub fn arm(&self, name: Option<&str>) -> Result<SessionId, TrackLogError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TrackLogError::NoRuntime)?;
        let inner = &self.inner;

        {
            let mut state = inner.state.lock();
            match state.phase {
                LoggerPhase::Disarmed | LoggerPhase::Failed => {
                    state.phase = LoggerPhase::Arming;
                }
                phase => return Err(TrackLogError::AlreadyActive(phase)),
            }
        }

        let tracker = match inner.context.tracker() {
            Ok(tracker) => tracker,
            Err(e) => {
                error!(error = %e, "Failed to start position tracking");
                inner.state.lock().phase = LoggerPhase::Disarmed;
                return Err(TrackLogError::Tracker(e));
            }
        };

        let interval = inner.settings.sampling_interval();
        let minimum_distance = inner.settings.minimum_distance_meters();
        let started_at = Utc::now();
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| default_session_name(started_at));

        let session = match inner.store.open_session(&name, started_at) {
            Ok(id) => id,
            Err(e) => {
                error!(name = %name, error = %e, "Failed to open logging session");
                inner.state.lock().phase = LoggerPhase::Disarmed;
                return Err(TrackLogError::OpenSession(e));
            }
        };

        inner.reset_counters();
        inner.latest.clear();
        let listener: Arc<dyn PositionListener> = inner.latest.clone();
        tracker.subscribe(listener);

        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let params = WorkerParams {
            session,
            interval,
            minimum_distance,
            cancel: cancel.clone(),
            wake: Arc::clone(&wake),
        };

        {
            let mut state = inner.state.lock();
            state.session = Some(LoggingSession::new(session, name.clone(), started_at));
            state.track.clear();
            state.cancel = Some(cancel);
            state.wake = Some(wake);
            state.phase = LoggerPhase::Armed;
            state.worker = Some(runtime.spawn(Arc::clone(inner).run_worker(params)));
        }

        info!(
            session_id = session,
            name = %name,
            interval_ms = interval.as_millis() as u64,
            min_distance_m = minimum_distance,
            "Track logging armed"
        );
        inner.emit(TrackLogEvent::Started { session, name });
        Ok(session)
    }

    /// Request the session to stop.
    ///
    /// Returns immediately; the worker deletes or closes the session after
    /// its in-flight iteration. Returns false if nothing was armed.
    pub fn disarm(&self) -> bool {
        let inner = &self.inner;
        let cancel = {
            let mut state = inner.state.lock();
            if state.phase != LoggerPhase::Armed {
                return false;
            }
            state.phase = LoggerPhase::Disarming;
            state.wake = None;
            state.cancel.take()
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        inner.unsubscribe();
        debug!("Track logging disarm requested");
        true
    }

    /// Wait until the worker has finished (session finalized or failed).
    pub async fn wait_stopped(&self) {
        let worker = self.inner.state.lock().worker.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Track logging worker panicked");
            }
        }
    }

    /// Wake the worker out of its wait between samples.
    ///
    /// Sampling continues; the interruption is logged and reported. If the
    /// worker is busy appending, its next wait ends at once.
    pub fn interrupt_wait(&self) {
        if let Some(wake) = self.inner.state.lock().wake.as_ref() {
            wake.notify_one();
        }
    }

    pub fn phase(&self) -> LoggerPhase {
        self.inner.state.lock().phase
    }

    /// Returns true while a session is recording.
    pub fn is_armed(&self) -> bool {
        self.phase() == LoggerPhase::Armed
    }

    /// Id of the session being recorded or finalized.
    pub fn current_session_id(&self) -> Option<SessionId> {
        self.inner.state.lock().session.as_ref().map(|s| s.id)
    }

    /// Snapshot of the current session with live counters.
    pub fn session(&self) -> Option<LoggingSession> {
        let mut session = self.inner.state.lock().session.clone()?;
        session.accepted_points = self.accepted_point_count();
        session.distance_meters = self.cumulative_distance_meters();
        Some(session)
    }

    pub fn accepted_point_count(&self) -> u64 {
        self.inner.accepted.load(Ordering::SeqCst)
    }

    pub fn cumulative_distance_meters(&self) -> f64 {
        f64::from_bits(self.inner.distance_bits.load(Ordering::SeqCst))
    }

    /// `(longitude, latitude)` of the points accepted so far.
    pub fn current_track(&self) -> Vec<(f64, f64)> {
        self.inner.state.lock().track.clone()
    }

    /// Whether the tracker currently reports a fix.
    pub fn has_fix(&self) -> bool {
        self.inner
            .context
            .existing()
            .is_some_and(|tracker| tracker.has_fix())
    }

    /// Subscribe to lifecycle and failure events.
    pub fn events(&self) -> broadcast::Receiver<TrackLogEvent> {
        self.inner.events_tx.subscribe()
    }
}

impl LoggerInner {
    async fn run_worker(self: Arc<Self>, params: WorkerParams) {
        let session = params.session;
        let mut last_accepted: Option<Arc<PositionSample>> = None;

        loop {
            if params.cancel.is_cancelled() {
                break;
            }

            let has_fix = self
                .live_tracker(session)
                .is_some_and(|tracker| tracker.has_fix());

            if !has_fix {
                trace!(session_id = session, "No fix, skipping sample");
            } else if let Some(sample) = self.latest.get() {
                if let Some(step) = self.accept_distance(&sample, last_accepted.as_deref(), &params)
                {
                    // disarm() may have landed while we were deciding
                    if params.cancel.is_cancelled() {
                        break;
                    }

                    let point = LogPoint::from(sample.as_ref());
                    if let Err(e) = self.append(session, point).await {
                        if self.fail(session, e) {
                            self.finalize(session).await;
                        }
                        return;
                    }
                    self.record_accepted(session, &point, step);
                    last_accepted = Some(sample);
                }
            } else {
                trace!(session_id = session, "No position yet");
            }

            match self.wait(&params).await {
                WaitOutcome::Elapsed => {}
                WaitOutcome::Cancelled => break,
                WaitOutcome::Interrupted => {
                    warn!(session_id = session, "Sampling wait interrupted, continuing");
                    self.emit(TrackLogEvent::WaitInterrupted { session });
                    self.alerter.notice("Track logging wait was interrupted");
                }
            }
        }

        self.finalize(session).await;
    }

    /// The live tracker, restarted by the context if the platform stopped it.
    fn live_tracker(&self, session: SessionId) -> Option<PositionTracker> {
        match self.context.tracker() {
            Ok(tracker) => Some(tracker),
            Err(e) => {
                warn!(session_id = session, error = %e, "Position tracker unavailable");
                None
            }
        }
    }

    /// Distance to credit if the sample should be stored, `None` to skip it.
    fn accept_distance(
        &self,
        sample: &PositionSample,
        last_accepted: Option<&PositionSample>,
        params: &WorkerParams,
    ) -> Option<f64> {
        if !sample.fix.is_valid() {
            debug!(
                session_id = params.session,
                lat = sample.latitude(),
                lon = sample.longitude(),
                "Skipping invalid position"
            );
            return None;
        }

        let Some(previous) = last_accepted else {
            return Some(0.0);
        };

        let distance = previous.distance_to(sample);
        if distance < params.minimum_distance {
            trace!(
                session_id = params.session,
                distance_m = distance,
                "Position too close to last point"
            );
            return None;
        }
        Some(distance)
    }

    /// Append the point and remember it as the last known position.
    async fn append(&self, session: SessionId, point: LogPoint) -> Result<(), StoreError> {
        let store = Arc::clone(&self.store);
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || {
            store.append_point(session, &point)?;
            if let Err(e) = settings.set_last_known_position(point.longitude, point.latitude) {
                warn!(error = %e, "Failed to remember last position");
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Write(format!("store task failed: {}", e)))?
    }

    fn record_accepted(&self, session: SessionId, point: &LogPoint, step: f64) {
        let points = self.accepted.fetch_add(1, Ordering::SeqCst) + 1;
        let distance = f64::from_bits(self.distance_bits.load(Ordering::SeqCst)) + step;
        self.distance_bits.store(distance.to_bits(), Ordering::SeqCst);
        self.state
            .lock()
            .track
            .push((point.longitude, point.latitude));

        debug!(
            session_id = session,
            points,
            distance_m = format!("{:.1}", distance),
            "Track point stored"
        );
        self.emit(TrackLogEvent::PointAccepted {
            session,
            points,
            distance_meters: distance,
        });
    }

    async fn wait(&self, params: &WorkerParams) -> WaitOutcome {
        tokio::select! {
            biased;
            _ = params.cancel.cancelled() => WaitOutcome::Cancelled,
            _ = params.wake.notified() => WaitOutcome::Interrupted,
            _ = tokio::time::sleep(params.interval) => WaitOutcome::Elapsed,
        }
    }

    /// Delete or close the session after a requested stop.
    async fn finalize(&self, session: SessionId) {
        let points = self.accepted.load(Ordering::SeqCst);
        let distance = f64::from_bits(self.distance_bits.load(Ordering::SeqCst));
        let store = Arc::clone(&self.store);

        let result = tokio::task::spawn_blocking(move || -> Result<bool, StoreError> {
            if points < MIN_SESSION_POINTS {
                store.delete_session(session).map(|_| false)
            } else {
                store.set_session_length(session, distance)?;
                store.close_session(session, Utc::now()).map(|_| true)
            }
        })
        .await
        .map_err(|e| StoreError::Write(format!("store task failed: {}", e)))
        .and_then(|r| r);

        self.reset_counters();
        {
            let mut state = self.state.lock();
            state.session = None;
            state.track.clear();
            state.phase = LoggerPhase::Disarmed;
        }

        match result {
            Ok(kept) => {
                if kept {
                    info!(
                        session_id = session,
                        points,
                        distance_m = format!("{:.1}", distance),
                        "Track log closed"
                    );
                } else {
                    info!(
                        session_id = session,
                        points, "Track log too short, deleted"
                    );
                }
                self.emit(TrackLogEvent::Stopped {
                    session,
                    points,
                    kept,
                });
            }
            Err(e) => {
                error!(session_id = session, error = %e, "Failed to finalize track log");
                self.raise_write_failure(session, &e);
            }
        }
    }

    /// Abandon the session after a store error.
    ///
    /// Returns true if `disarm()` was already requested: the phase stays
    /// Disarming and the caller still finalizes the session.
    fn fail(&self, session: SessionId, e: StoreError) -> bool {
        let stopping = {
            let mut state = self.state.lock();
            let stopping = state.phase == LoggerPhase::Disarming;
            if !stopping {
                state.phase = LoggerPhase::Failed;
                state.session = None;
            }
            state.wake = None;
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }
            stopping
        };
        self.unsubscribe();

        if e.is_exhausted() {
            error!(session_id = session, error = %e, "Storage exhausted, track logging stopped");
            self.emit(TrackLogEvent::StorageExhausted {
                session,
                message: e.to_string(),
            });
            self.alerter.prompt(
                "The storage is full. Track logging has stopped; points recorded so far are kept.",
                Acknowledgement::new(),
            );
        } else {
            error!(session_id = session, error = %e, "Track point write failed, track logging stopped");
            self.raise_write_failure(session, &e);
        }
        stopping
    }

    fn raise_write_failure(&self, session: SessionId, e: &StoreError) {
        self.emit(TrackLogEvent::WriteFailed {
            session,
            message: e.to_string(),
        });
        raise_alarm(
            Arc::clone(&self.alerter),
            format!("Track logging stopped: {}", e),
            self.config.alarm_delay,
        );
    }

    /// Leave whichever tracker currently holds the listener.
    fn unsubscribe(&self) {
        let listener: Arc<dyn PositionListener> = self.latest.clone();
        if let Some(tracker) = self.context.existing() {
            tracker.unsubscribe(&listener);
        }
    }

    fn reset_counters(&self) {
        self.accepted.store(0, Ordering::SeqCst);
        self.distance_bits.store(0f64.to_bits(), Ordering::SeqCst);
    }

    fn emit(&self, event: TrackLogEvent) {
        // No receivers is fine
        let _ = self.events_tx.send(event);
    }
}
