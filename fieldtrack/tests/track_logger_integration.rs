//! Integration tests for track logging.
//!
//! These tests drive the whole chain: manual source → tracker → logger →
//! store, with a scripted store for fault injection:
//! - Distance filtering against the last accepted point
//! - Session finalization (delete short sessions, close the rest)
//! - Storage exhaustion and write failure handling
//! - disarm() racing an in-flight append
//! - Interrupted waits
//! - Tracker restarts during a session
//!
//! Run with: `cargo test --test track_logger_integration`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use fieldtrack::config::{ConfigFile, IniTrackingSettings, MemorySettings, SettingsProvider};
use fieldtrack::geo::offset_north;
use fieldtrack::position::{
    GpsEvent, ManualSource, RawFix, ReplayConfig, ReplayEntry, ReplaySource, TrackerContext,
};
use fieldtrack::track::{
    Acknowledgement, Alerter, LoggerConfig, LoggerPhase, LogPoint, MemoryTrackStore,
    PersistentTrackStore, SessionId, SessionSummary, SqliteTrackStore, StoreError, StoreOp,
    TrackLogEvent, TrackLogError, TrackLogger,
};

// ============================================================================
// Test Helpers
// ============================================================================

const START_LAT: f64 = 46.4983;
const START_LON: f64 = 11.3548;

/// Sampling interval used by most tests.
const INTERVAL: Duration = Duration::from_millis(20);

/// Time to let the worker see a pushed fix.
const SETTLE: Duration = Duration::from_millis(100);

/// How an append should fail.
#[derive(Clone, Copy)]
enum Fault {
    Exhausted,
    Write,
}

/// Store wrapper with fault injection and delays.
#[derive(Default)]
struct ScriptedStore {
    inner: MemoryTrackStore,
    appends: AtomicU64,
    fail_at: Mutex<Option<(u64, Fault)>>,
    append_delay: Mutex<Duration>,
    append_in_flight: AtomicBool,
}

impl ScriptedStore {
    /// Fail the `n`th append (1-based) and every one after it.
    fn fail_append_at(&self, n: u64, fault: Fault) {
        *self.fail_at.lock() = Some((n, fault));
    }

    fn delay_appends(&self, delay: Duration) {
        *self.append_delay.lock() = delay;
    }
}

impl PersistentTrackStore for ScriptedStore {
    fn open_session(&self, name: &str, created_at: DateTime<Utc>) -> Result<SessionId, StoreError> {
        self.inner.open_session(name, created_at)
    }

    fn append_point(&self, session: SessionId, point: &LogPoint) -> Result<(), StoreError> {
        let n = self.appends.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.append_delay.lock();
        if !delay.is_zero() {
            self.append_in_flight.store(true, Ordering::SeqCst);
            std::thread::sleep(delay);
            self.append_in_flight.store(false, Ordering::SeqCst);
        }

        if let Some((at, fault)) = *self.fail_at.lock() {
            if n >= at {
                return Err(match fault {
                    Fault::Exhausted => StoreError::Exhausted("disk full".into()),
                    Fault::Write => StoreError::Write("I/O error".into()),
                });
            }
        }
        self.inner.append_point(session, point)
    }

    fn close_session(&self, session: SessionId, ended_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.close_session(session, ended_at)
    }

    fn delete_session(&self, session: SessionId) -> Result<(), StoreError> {
        self.inner.delete_session(session)
    }

    fn set_session_length(&self, session: SessionId, meters: f64) -> Result<(), StoreError> {
        self.inner.set_session_length(session, meters)
    }

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.inner.list_sessions()
    }
}

/// Alerter recording every call.
#[derive(Default)]
struct RecordingAlerter {
    calls: Mutex<Vec<String>>,
    prompts: Mutex<Vec<Acknowledgement>>,
}

impl RecordingAlerter {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl Alerter for RecordingAlerter {
    fn notice(&self, message: &str) {
        self.calls.lock().push(format!("notice: {}", message));
    }

    fn prompt(&self, message: &str, ack: Acknowledgement) {
        self.calls.lock().push(format!("prompt: {}", message));
        self.prompts.lock().push(ack);
    }

    fn start_alarm(&self) {
        self.calls.lock().push("start_alarm".to_string());
    }

    fn stop_alarm(&self) {
        self.calls.lock().push("stop_alarm".to_string());
    }
}

struct Harness {
    logger: TrackLogger,
    context: Arc<TrackerContext>,
    source: Arc<ManualSource>,
    store: Arc<ScriptedStore>,
    settings: Arc<MemorySettings>,
    alerter: Arc<RecordingAlerter>,
    events: broadcast::Receiver<TrackLogEvent>,
}

impl Harness {
    fn new(interval: Duration, min_distance: f64) -> Self {
        let config = LoggerConfig {
            alarm_delay: Duration::from_millis(50),
            ..Default::default()
        };
        Self::with_config(interval, min_distance, config)
    }

    fn with_config(interval: Duration, min_distance: f64, config: LoggerConfig) -> Self {
        let source = Arc::new(ManualSource::new("manual"));
        let context = Arc::new(TrackerContext::new(source.clone()));

        let store = Arc::new(ScriptedStore::default());
        let settings = Arc::new(MemorySettings::new(interval, min_distance));
        let alerter = Arc::new(RecordingAlerter::default());
        let logger = TrackLogger::with_config(
            Arc::clone(&context),
            store.clone(),
            settings.clone(),
            alerter.clone(),
            config,
        );
        let events = logger.events();

        Self {
            logger,
            context,
            source,
            store,
            settings,
            alerter,
            events,
        }
    }

    /// Push a fix `meters` north of the start point, followed by the status
    /// event a receiver sends with it.
    fn push_position(&self, meters: f64) {
        let (lat, lon) = offset_north((START_LAT, START_LON), meters);
        self.source.push_fix(Some(RawFix::now(lon, lat, 0.0)));
        self.source.push_status(GpsEvent::SatelliteStatus);
    }

    /// Push a position and let the worker sample it.
    async fn move_to(&self, meters: f64) {
        self.push_position(meters);
        tokio::time::sleep(SETTLE).await;
    }

    /// Subscribers on the tracker the context currently hands out.
    fn subscribers(&self) -> usize {
        self.context
            .existing()
            .map(|tracker| tracker.subscriber_count())
            .unwrap_or(0)
    }

    /// Wait for the first event matching `pred`.
    async fn expect_event<F>(&mut self, pred: F) -> TrackLogEvent
    where
        F: Fn(&TrackLogEvent) -> bool,
    {
        let deadline = Duration::from_secs(2);
        tokio::time::timeout(deadline, async {
            loop {
                match self.events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) => continue,
                    Err(e) => panic!("Event channel failed: {}", e),
                }
            }
        })
        .await
        .expect("Timed out waiting for event")
    }

    /// Collect the events already queued.
    fn drain_events(&mut self) -> Vec<TrackLogEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

fn position_of(ops: &[StoreOp], wanted: impl Fn(&StoreOp) -> bool) -> Option<usize> {
    ops.iter().position(wanted)
}

// ============================================================================
// Distance Filter Tests
// ============================================================================

/// With a 10 m threshold and fixes at 0, 4, 4 and 12 m from the previously
/// accepted point, exactly the 0 m and 12 m samples are stored.
#[tokio::test]
async fn test_minimum_distance_filter() {
    let h = Harness::new(INTERVAL, 10.0);
    let session = h.logger.arm(Some("filter")).unwrap();

    h.move_to(0.0).await;
    h.move_to(4.0).await;
    h.move_to(4.0).await;
    h.move_to(12.0).await;

    let points = h.store.inner.points(session).unwrap();
    assert_eq!(points.len(), 2);
    let expected = offset_north((START_LAT, START_LON), 12.0);
    assert!((points[1].latitude - expected.0).abs() < 1e-9);

    assert_eq!(h.logger.accepted_point_count(), 2);
    assert!((h.logger.cumulative_distance_meters() - 12.0).abs() < 1e-6);

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

/// Distance is measured from the last accepted point, not the last sample:
/// creeping forward in small steps is eventually recorded.
#[tokio::test]
async fn test_distance_measured_from_last_accepted() {
    let h = Harness::new(INTERVAL, 10.0);
    let session = h.logger.arm(Some("creep")).unwrap();

    for step in 0..=4 {
        h.move_to(step as f64 * 3.0).await;
    }

    // 0 m accepted, 3/6/9 m rejected, 12 m is 12 m from the last accepted
    let points = h.store.inner.points(session).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(h.logger.current_track().len(), 2);

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

/// Each accepted point is written through to the settings.
#[tokio::test]
async fn test_last_position_written_through() {
    let h = Harness::new(INTERVAL, 1.0);
    h.logger.arm(Some("warm")).unwrap();

    h.move_to(0.0).await;
    h.move_to(25.0).await;

    let (lat, lon) = offset_north((START_LAT, START_LON), 25.0);
    let (saved_lon, saved_lat) = h.settings.last_known_position().unwrap();
    assert!((saved_lon - lon).abs() < 1e-9);
    assert!((saved_lat - lat).abs() < 1e-9);

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

// ============================================================================
// Session Lifecycle Tests
// ============================================================================

/// Arm "trackA", one accepted point, disarm: deleted, never closed.
#[tokio::test]
async fn test_single_point_session_deleted() {
    let mut h = Harness::new(INTERVAL, 1.0);
    let session = h.logger.arm(Some("trackA")).unwrap();

    h.move_to(0.0).await;
    assert_eq!(h.logger.accepted_point_count(), 1);

    assert!(h.logger.disarm());
    h.logger.wait_stopped().await;

    let ops = h.store.inner.journal();
    assert!(ops.contains(&StoreOp::Delete(session)));
    assert!(!ops.contains(&StoreOp::Close(session)));
    assert!(!h.store.inner.contains(session));

    let stopped = h
        .expect_event(|e| matches!(e, TrackLogEvent::Stopped { .. }))
        .await;
    assert_eq!(
        stopped,
        TrackLogEvent::Stopped {
            session,
            points: 1,
            kept: false
        }
    );
}

/// Arm, two accepted points, disarm: exactly one close, with the length set
/// first and counters reset afterwards.
#[tokio::test]
async fn test_two_point_session_closed() {
    let h = Harness::new(INTERVAL, 1.0);
    let session = h.logger.arm(Some("trackB")).unwrap();

    h.move_to(0.0).await;
    h.move_to(30.0).await;
    assert_eq!(h.logger.accepted_point_count(), 2);

    h.logger.disarm();
    h.logger.wait_stopped().await;

    let ops = h.store.inner.journal();
    let closes = ops
        .iter()
        .filter(|op| **op == StoreOp::Close(session))
        .count();
    assert_eq!(closes, 1);
    assert!(!ops.contains(&StoreOp::Delete(session)));

    let set_length = position_of(&ops, |op| *op == StoreOp::SetLength(session)).unwrap();
    let close = position_of(&ops, |op| *op == StoreOp::Close(session)).unwrap();
    assert!(set_length < close);

    let sessions = h.store.list_sessions().unwrap();
    let summary = &sessions[0];
    assert!(summary.is_closed());
    assert_eq!(summary.point_count, 2);
    assert!((summary.length_meters - 30.0).abs() < 1e-6);

    assert_eq!(h.logger.phase(), LoggerPhase::Disarmed);
    assert_eq!(h.logger.accepted_point_count(), 0);
    assert_eq!(h.logger.cumulative_distance_meters(), 0.0);
    assert!(h.logger.current_track().is_empty());
}

/// A second session starts from zero and gets a fresh id.
#[tokio::test]
async fn test_rearm_resets_counters() {
    let h = Harness::new(INTERVAL, 1.0);

    let first = h.logger.arm(Some("one")).unwrap();
    h.move_to(0.0).await;
    h.move_to(10.0).await;
    h.logger.disarm();

    // The worker has not finalized yet
    let during = h.logger.arm(Some("too early"));
    assert!(matches!(
        during,
        Err(TrackLogError::AlreadyActive(LoggerPhase::Disarming))
    ));
    h.logger.wait_stopped().await;

    let second = h.logger.arm(Some("two")).unwrap();
    assert_ne!(first, second);
    assert_eq!(h.logger.accepted_point_count(), 0);
    assert_eq!(h.logger.cumulative_distance_meters(), 0.0);

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

// ============================================================================
// Failure Tests
// ============================================================================

/// Exhaustion on the third append: Failed, not armed, two points kept, one
/// non-recoverable notification and no alarm.
#[tokio::test]
async fn test_storage_exhaustion() {
    let mut h = Harness::new(INTERVAL, 1.0);
    h.store.fail_append_at(3, Fault::Exhausted);
    let session = h.logger.arm(Some("full")).unwrap();

    h.move_to(0.0).await;
    h.move_to(10.0).await;
    h.move_to(20.0).await;

    assert_eq!(h.logger.phase(), LoggerPhase::Failed);
    assert!(!h.logger.is_armed());
    assert_eq!(h.store.inner.points(session).unwrap().len(), 2);
    assert!(h.store.inner.contains(session), "Committed points remain");

    // Later fixes change nothing
    h.move_to(40.0).await;
    assert_eq!(h.store.appends.load(Ordering::SeqCst), 3);

    let failures: Vec<_> = h
        .drain_events()
        .into_iter()
        .filter(|e| e.is_failure())
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0],
        TrackLogEvent::StorageExhausted { .. }
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.alerter.count("prompt:"), 1);
    assert_eq!(h.alerter.count("start_alarm"), 0);

    let ops = h.store.inner.journal();
    assert!(!ops.contains(&StoreOp::Close(session)));
    assert!(!ops.contains(&StoreOp::Delete(session)));
}

/// A generic write error fails the session and raises the prompt and alarm
/// after the delay; acknowledging silences it.
#[tokio::test]
async fn test_write_failure_raises_delayed_alarm() {
    let mut h = Harness::new(INTERVAL, 1.0);
    h.store.fail_append_at(2, Fault::Write);
    h.logger.arm(Some("broken")).unwrap();

    h.move_to(0.0).await;
    h.move_to(10.0).await;

    let event = h
        .expect_event(|e| matches!(e, TrackLogEvent::WriteFailed { .. }))
        .await;
    assert!(event.is_failure());
    assert_eq!(h.logger.phase(), LoggerPhase::Failed);

    // 50 ms alarm delay
    tokio::time::sleep(Duration::from_millis(150)).await;
    let calls = h.alerter.calls();
    let prompt = calls.iter().position(|c| c.starts_with("prompt:")).unwrap();
    let alarm = calls.iter().position(|c| c == "start_alarm").unwrap();
    assert!(prompt < alarm);
    assert_eq!(h.alerter.count("stop_alarm"), 0);

    let ack = h.alerter.prompts.lock()[0].clone();
    ack.acknowledge();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.alerter.count("stop_alarm"), 1);
}

/// A failed logger can be armed again.
#[tokio::test]
async fn test_rearm_after_failure() {
    let h = Harness::new(INTERVAL, 1.0);
    h.store.fail_append_at(1, Fault::Write);
    h.logger.arm(Some("broken")).unwrap();
    h.move_to(0.0).await;
    assert_eq!(h.logger.phase(), LoggerPhase::Failed);

    *h.store.fail_at.lock() = None;
    let session = h.logger.arm(Some("retry")).unwrap();
    assert!(h.logger.is_armed());
    h.move_to(5.0).await;
    assert_eq!(h.store.inner.points(session).unwrap().len(), 1);

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

/// A failed append leaves the last known position untouched.
#[tokio::test]
async fn test_failed_append_not_remembered() {
    let h = Harness::new(INTERVAL, 1.0);
    h.store.fail_append_at(2, Fault::Write);
    h.logger.arm(Some("half")).unwrap();

    h.move_to(0.0).await;
    h.move_to(40.0).await;
    assert_eq!(h.logger.phase(), LoggerPhase::Failed);

    let (lat, lon) = offset_north((START_LAT, START_LON), 0.0);
    let (saved_lon, saved_lat) = h.settings.last_known_position().unwrap();
    assert!((saved_lon - lon).abs() < 1e-9);
    assert!((saved_lat - lat).abs() < 1e-9);
}

/// A store error on the append disarm() was waiting for is reported, but the
/// session is still finalized and the logger ends Disarmed, not Failed.
#[tokio::test]
async fn test_failure_after_disarm_still_finalizes() {
    let mut h = Harness::new(INTERVAL, 1.0);
    h.store.delay_appends(Duration::from_millis(150));
    h.store.fail_append_at(1, Fault::Write);
    let session = h.logger.arm(Some("late failure")).unwrap();

    h.push_position(0.0);
    for _ in 0..100 {
        if h.store.append_in_flight.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.store.append_in_flight.load(Ordering::SeqCst));

    assert!(h.logger.disarm());
    h.logger.wait_stopped().await;

    assert_eq!(h.logger.phase(), LoggerPhase::Disarmed);
    assert!(h.logger.current_session_id().is_none());
    assert!(h.store.inner.journal().contains(&StoreOp::Delete(session)));

    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, TrackLogEvent::WriteFailed { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        TrackLogEvent::Stopped {
            points: 0,
            kept: false,
            ..
        }
    )));
}

// ============================================================================
// Fix Gating Tests
// ============================================================================

/// Positions that arrive while the tracker reports no fix are not stored.
#[tokio::test]
async fn test_no_points_while_fix_lost() {
    let h = Harness::new(INTERVAL, 1.0);
    let session = h.logger.arm(Some("tunnel")).unwrap();

    h.move_to(0.0).await;
    assert_eq!(h.logger.accepted_point_count(), 1);

    // Provider switched off: the tracker reports no fix
    h.source.set_enabled(false);
    h.source.push_status(GpsEvent::SatelliteStatus);
    assert!(!h.logger.has_fix());

    let (lat, lon) = offset_north((START_LAT, START_LON), 770.0);
    h.source.push_fix(Some(RawFix::now(lon, lat, 0.0)));
    tokio::time::sleep(SETTLE).await;
    assert_eq!(h.logger.accepted_point_count(), 1);
    assert_eq!(h.store.inner.points(session).unwrap().len(), 1);

    h.source.set_enabled(true);
    h.move_to(770.0).await;
    assert_eq!(h.logger.accepted_point_count(), 2);

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

// ============================================================================
// Tracker Restart Tests
// ============================================================================

/// The platform drops the tracker mid-session: sampling resumes on the
/// restarted tracker and disarm() leaves no listener behind.
#[tokio::test]
async fn test_session_survives_tracker_restart() {
    let h = Harness::new(INTERVAL, 1.0);
    let session = h.logger.arm(Some("restart")).unwrap();
    assert_eq!(h.subscribers(), 1);

    h.move_to(0.0).await;
    assert_eq!(h.logger.accepted_point_count(), 1);

    h.source.drop_registration();
    assert!(!h.source.is_started());

    // The worker re-acquires the tracker on its next iteration
    tokio::time::sleep(SETTLE).await;
    assert!(h.source.is_started());
    assert_eq!(h.subscribers(), 1);

    h.move_to(30.0).await;
    assert_eq!(h.logger.accepted_point_count(), 2);
    assert_eq!(h.store.inner.points(session).unwrap().len(), 2);

    h.logger.disarm();
    h.logger.wait_stopped().await;
    assert_eq!(h.subscribers(), 0);
}

/// Re-acquiring from outside the logger also carries the listener over, and
/// disarm() removes it from the replacement tracker.
#[tokio::test]
async fn test_disarm_after_external_reacquire() {
    let h = Harness::new(Duration::from_secs(30), 1.0);
    h.logger.arm(Some("external")).unwrap();

    h.source.drop_registration();
    let fresh = h.context.tracker().unwrap();
    assert!(fresh.is_listening());
    assert_eq!(fresh.subscriber_count(), 1);

    h.logger.disarm();
    h.logger.wait_stopped().await;
    assert_eq!(fresh.subscriber_count(), 0);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// disarm() while an append is in flight: the append completes first and
/// nothing is appended after the session is finalized.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disarm_during_in_flight_append() {
    let h = Harness::new(INTERVAL, 1.0);
    h.store.delay_appends(Duration::from_millis(200));
    let session = h.logger.arm(Some("racy")).unwrap();

    h.push_position(0.0);

    for _ in 0..100 {
        if h.store.append_in_flight.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.store.append_in_flight.load(Ordering::SeqCst));

    // Keep moving so the worker would have more to write
    h.push_position(50.0);

    assert!(h.logger.disarm());
    assert!(!h.logger.is_armed());
    h.logger.wait_stopped().await;

    let ops = h.store.inner.journal();
    let last_append = ops
        .iter()
        .rposition(|op| *op == StoreOp::Append(session))
        .expect("The in-flight append completes");
    let finalized = position_of(&ops, |op| {
        *op == StoreOp::Close(session) || *op == StoreOp::Delete(session)
    })
    .expect("Session finalized");
    assert!(last_append < finalized);
    assert_eq!(h.store.appends.load(Ordering::SeqCst), 1);
}

/// Accessors are callable from other threads while the worker runs.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_accessors_from_other_threads() {
    let h = Harness::new(Duration::from_millis(5), 0.5);
    h.logger.arm(Some("busy")).unwrap();

    let reader = {
        let logger = h.logger.clone();
        std::thread::spawn(move || {
            let mut last = 0;
            for _ in 0..200 {
                let count = logger.accepted_point_count();
                assert!(count >= last, "Counter must not decrease while armed");
                last = count;
                let _ = logger.cumulative_distance_meters();
                let _ = logger.current_session_id();
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };

    for i in 0..20 {
        h.push_position(i as f64 * 2.0);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    reader.join().unwrap();
    h.logger.disarm();
    h.logger.wait_stopped().await;
}

// ============================================================================
// Interrupted Wait Tests
// ============================================================================

/// Interrupting the wait is reported and the loop goes on.
#[tokio::test]
async fn test_interrupted_wait_continues() {
    let mut h = Harness::new(Duration::from_secs(30), 1.0);
    h.logger.arm(Some("patient")).unwrap();

    // The first iteration finds nothing and starts a long wait
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.push_position(0.0);
    assert_eq!(h.logger.accepted_point_count(), 0);

    h.logger.interrupt_wait();

    h.expect_event(|e| matches!(e, TrackLogEvent::WaitInterrupted { .. }))
        .await;
    h.expect_event(|e| matches!(e, TrackLogEvent::PointAccepted { points: 1, .. }))
        .await;

    assert!(h.logger.is_armed());
    assert_eq!(h.alerter.count("notice:"), 1);

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

/// An interruption that arrives while an append is in flight ends the next
/// wait instead of being lost.
#[tokio::test]
async fn test_interrupt_during_append_not_lost() {
    let mut h = Harness::new(Duration::from_secs(30), 1.0);
    h.store.delay_appends(Duration::from_millis(150));
    h.logger.arm(Some("busy")).unwrap();

    // Seen by the worker's first iteration
    h.push_position(0.0);
    for _ in 0..100 {
        if h.store.append_in_flight.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.store.append_in_flight.load(Ordering::SeqCst));

    h.logger.interrupt_wait();

    h.expect_event(|e| matches!(e, TrackLogEvent::PointAccepted { points: 1, .. }))
        .await;
    h.expect_event(|e| matches!(e, TrackLogEvent::WaitInterrupted { .. }))
        .await;
    assert!(h.logger.is_armed());

    h.logger.disarm();
    h.logger.wait_stopped().await;
}

// ============================================================================
// End-to-end Tests
// ============================================================================

/// Replay source → tracker → logger → SQLite.
#[tokio::test]
async fn test_replay_to_sqlite() {
    let temp = tempfile::TempDir::new().unwrap();
    let store = Arc::new(SqliteTrackStore::open(&temp.path().join("tracks.db")).unwrap());

    let entries: Vec<ReplayEntry> = (0..10)
        .map(|i| {
            let (lat, lon) = offset_north((START_LAT, START_LON), i as f64 * 5.0);
            ReplayEntry::new(i * 10, lon, lat, 260.0)
        })
        .collect();
    let source = Arc::new(ReplaySource::with_config(
        entries,
        ReplayConfig {
            fallback_delay: Duration::from_millis(10),
            looping: false,
        },
    ));
    let context = Arc::new(TrackerContext::new(source));

    let logger = TrackLogger::new(
        context,
        store.clone(),
        Arc::new(MemorySettings::new(Duration::from_millis(15), 1.0)),
        Arc::new(RecordingAlerter::default()),
    );
    let session = logger.arm(None).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    logger.disarm();
    logger.wait_stopped().await;

    let sessions = store.list_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].name.starts_with("log_"));
    assert!(sessions[0].is_closed());
    assert!(sessions[0].point_count >= 2);

    let points = store.session_points(session).unwrap();
    assert_eq!(points.len() as u64, sessions[0].point_count);
    assert!(points.iter().all(|p| p.altitude == 260.0));
}

/// The INI-backed settings drive the logger and receive the last position.
#[tokio::test]
async fn test_ini_settings_round_trip() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("config.ini");

    let mut config = ConfigFile::default();
    config.tracking.sampling_interval = 1;
    config.tracking.minimum_distance = 7.5;
    config.save_to(&path).unwrap();

    let settings = Arc::new(IniTrackingSettings::new(&path));
    assert_eq!(settings.minimum_distance_meters(), 7.5);

    let source = Arc::new(ManualSource::new("manual"));
    let context = Arc::new(TrackerContext::new(source.clone()));
    let logger = TrackLogger::new(
        context,
        Arc::new(MemoryTrackStore::new()),
        settings,
        Arc::new(RecordingAlerter::default()),
    );
    logger.arm(Some("ini")).unwrap();

    // The worker has not run yet, so its first iteration sees this fix
    let (lat, lon) = offset_north((START_LAT, START_LON), 0.0);
    source.push_fix(Some(RawFix::now(lon, lat, 0.0)));
    source.push_status(GpsEvent::FirstFix);
    tokio::time::sleep(SETTLE).await;
    assert_eq!(logger.accepted_point_count(), 1);

    let reloaded = ConfigFile::load_from(&path).unwrap();
    let (saved_lon, saved_lat) = reloaded.position.last_known_position().unwrap();
    assert!((saved_lon - lon).abs() < 1e-6);
    assert!((saved_lat - lat).abs() < 1e-6);
    assert_eq!(reloaded.tracking.minimum_distance, 7.5);

    logger.disarm();
    logger.wait_stopped().await;
}
