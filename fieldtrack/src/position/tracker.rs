//! Position tracker - the single authority on where the device is.
//!
//! The tracker registers itself as the [`FixSink`] of a [`PositionSource`],
//! turns raw callbacks into immutable [`PositionSample`] snapshots, derives
//! the [`FixState`] and fans every update out to its subscribers.
//!
//! # Fan-out
//!
//! Subscribers are notified synchronously, on whatever context the source
//! delivers callbacks on, in subscription order. The subscriber list is
//! snapshotted before iterating, so listeners may subscribe or unsubscribe
//! from inside a callback. Listeners must return quickly: a slow listener
//! delays every listener behind it.
//!
//! Async consumers can use [`PositionTracker::updates`] instead, which
//! broadcasts the same samples over a tokio channel.
//!
//! # Fix staleness
//!
//! A fix is considered current while status events keep arriving. Once the
//! staleness window (3 seconds by default) passes without a status event,
//! [`PositionTracker::has_fix`] reports false even if the stored flag was set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use super::source::{FixSink, PositionSource, SourceError};
use super::state::{FixState, GpsEvent, PositionSample, RawFix};

/// Default staleness window for the fix state.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(3);

/// Subscriber of tracker updates.
pub trait PositionListener: Send + Sync {
    /// A new position was published.
    fn on_position(&self, sample: &Arc<PositionSample>);

    /// The fix state was recomputed after a status event.
    fn on_fix_status(&self, has_fix: bool);
}

/// Configuration for the position tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How long a fix stays current without status events.
    pub staleness_window: Duration,

    /// Capacity of the broadcast channel behind [`PositionTracker::updates`].
    pub broadcast_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            staleness_window: DEFAULT_STALENESS_WINDOW,
            broadcast_capacity: 16,
        }
    }
}

/// Timing state behind the fix flag.
#[derive(Debug, Default)]
struct FixClock {
    /// Raw flag as last computed from status events.
    has_fix: bool,

    /// When the last fix arrived.
    last_fix_at: Option<Instant>,

    /// When the last status event arrived.
    last_status_at: Option<Instant>,
}

struct TrackerInner {
    source: Arc<dyn PositionSource>,
    config: TrackerConfig,
    listeners: RwLock<Vec<Arc<dyn PositionListener>>>,
    /// Latest sample, replaced wholesale on every fix.
    current: RwLock<Option<Arc<PositionSample>>>,
    clock: Mutex<FixClock>,
    listening: AtomicBool,
    broadcast_tx: broadcast::Sender<Arc<PositionSample>>,
}

/// Process-wide position coordinator.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct PositionTracker {
    inner: Arc<TrackerInner>,
}

impl PositionTracker {
    /// Create a tracker over `source` with default configuration.
    ///
    /// The tracker does not listen until [`start_listening`](Self::start_listening).
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self::with_config(source, TrackerConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(source: Arc<dyn PositionSource>, config: TrackerConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            inner: Arc::new(TrackerInner {
                source,
                config,
                listeners: RwLock::new(Vec::new()),
                current: RwLock::new(None),
                clock: Mutex::new(FixClock::default()),
                listening: AtomicBool::new(false),
                broadcast_tx,
            }),
        }
    }

    /// Add a subscriber. Adding the same handle twice has no effect.
    ///
    /// Returns true if the listener was added.
    pub fn subscribe(&self, listener: Arc<dyn PositionListener>) -> bool {
        let mut listeners = self.inner.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove a subscriber. Removing an unknown handle has no effect.
    ///
    /// Returns true if the listener was removed.
    pub fn unsubscribe(&self, listener: &Arc<dyn PositionListener>) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Subscribe to position updates over a broadcast channel.
    pub fn updates(&self) -> broadcast::Receiver<Arc<PositionSample>> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Start receiving callbacks from the source.
    ///
    /// Does nothing if already listening. A disabled provider is not an
    /// error: the tracker listens and reports [`FixState::Off`] until the
    /// provider is switched on.
    pub fn start_listening(&self) -> Result<(), SourceError> {
        if self.is_listening() {
            return Ok(());
        }

        let source = &self.inner.source;
        if !source.is_enabled() {
            tracing::warn!(source = source.name(), "Position provider is disabled");
        }

        let sink: Arc<dyn FixSink> = self.inner.clone();
        source.start(sink)?;

        *self.inner.clock.lock() = FixClock::default();
        self.inner.listening.store(true, Ordering::SeqCst);
        tracing::info!(source = source.name(), "Started listening for positions");
        Ok(())
    }

    /// Detach from the source. Safe to call when not listening.
    pub fn stop_listening(&self) {
        self.inner.source.stop();
        let was_listening = self.inner.listening.swap(false, Ordering::SeqCst);
        self.inner.clock.lock().has_fix = false;
        if was_listening {
            tracing::info!(
                source = self.inner.source.name(),
                "Stopped listening for positions"
            );
        }
    }

    /// Returns true while attached to the source.
    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::SeqCst)
    }

    /// Whether the underlying provider is switched on.
    pub fn is_provider_enabled(&self) -> bool {
        self.inner.source.is_enabled()
    }

    /// Latest published sample, if any fix ever arrived.
    pub fn current_position(&self) -> Option<Arc<PositionSample>> {
        self.inner.current.read().clone()
    }

    /// Current fix state.
    pub fn fix_state(&self) -> FixState {
        self.inner.fix_state()
    }

    /// Returns true if the fix state is [`FixState::Fix`] and not stale.
    pub fn has_fix(&self) -> bool {
        self.fix_state() == FixState::Fix
    }

    /// Snapshot of the subscriber list, used to carry subscribers over
    /// when a dead tracker is replaced.
    pub(super) fn listeners_snapshot(&self) -> Vec<Arc<dyn PositionListener>> {
        self.inner.listeners.read().clone()
    }
}

impl TrackerInner {
    fn fix_state(&self) -> FixState {
        if !self.listening.load(Ordering::SeqCst) || !self.source.is_enabled() {
            return FixState::Off;
        }

        let clock = self.clock.lock();
        let fresh = clock
            .last_status_at
            .is_some_and(|at| at.elapsed() <= self.config.staleness_window);

        if clock.has_fix && fresh {
            FixState::Fix
        } else {
            FixState::ListeningNoFix
        }
    }

    fn notify_position(&self, sample: &Arc<PositionSample>) {
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.on_position(sample);
        }
        // No receivers is fine
        let _ = self.broadcast_tx.send(Arc::clone(sample));
    }

    fn notify_status(&self, has_fix: bool) {
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.on_fix_status(has_fix);
        }
    }
}

impl FixSink for TrackerInner {
    fn on_fix(&self, fix: Option<RawFix>) {
        let Some(fix) = fix else {
            tracing::trace!("Ignoring position callback without a fix");
            return;
        };

        self.clock.lock().last_fix_at = Some(Instant::now());

        let sample = {
            let mut current = self.current.write();
            let previous = current.as_ref().map(|s| s.fix);
            let sample = Arc::new(PositionSample::new(fix, previous));
            *current = Some(Arc::clone(&sample));
            sample
        };

        tracing::trace!(
            lat = format!("{:.6}", fix.latitude),
            lon = format!("{:.6}", fix.longitude),
            "Position update"
        );
        self.notify_position(&sample);
    }

    fn on_status(&self, event: GpsEvent) {
        {
            let mut clock = self.clock.lock();
            let now = Instant::now();
            match event {
                GpsEvent::FirstFix => {
                    tracing::info!(source = self.source.name(), "First fix");
                    clock.has_fix = true;
                }
                GpsEvent::SatelliteStatus => {
                    if self.current.read().is_some() {
                        clock.has_fix = clock.last_fix_at.is_some_and(|at| {
                            now.duration_since(at) < self.config.staleness_window
                        });
                    }
                }
                GpsEvent::Stopped => {
                    tracing::warn!(
                        source = self.source.name(),
                        "Position source stopped by the platform"
                    );
                    clock.has_fix = false;
                    self.listening.store(false, Ordering::SeqCst);
                }
            }
            clock.last_status_at = Some(now);
        }

        let has_fix = self.fix_state() == FixState::Fix;
        self.notify_status(has_fix);
    }
}

/// Compare listener handles by the object they point to.
fn same_listener(a: &Arc<dyn PositionListener>, b: &Arc<dyn PositionListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
