//! Position source abstraction.
//!
//! A [`PositionSource`] is whatever hardware or platform service produces
//! fixes. Sources push into a [`FixSink`] (the tracker) from whatever
//! execution context they run on; the tracker never polls.
//!
//! [`ManualSource`] is the push-driven adapter for embedders whose platform
//! delivers callbacks on its own, and for tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::state::{GpsEvent, RawFix};

/// Receiver of raw source callbacks.
pub trait FixSink: Send + Sync {
    /// A position report arrived. `None` models a callback without a value.
    fn on_fix(&self, fix: Option<RawFix>);

    /// A status event arrived.
    fn on_status(&self, event: GpsEvent);
}

/// A producer of raw fixes and status events.
pub trait PositionSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether the underlying provider is switched on.
    fn is_enabled(&self) -> bool;

    /// Start delivering callbacks to `sink`.
    ///
    /// Starting an already started source replaces its sink.
    fn start(&self, sink: Arc<dyn FixSink>) -> Result<(), SourceError>;

    /// Stop delivering callbacks. Safe to call when not started.
    fn stop(&self);
}

/// Errors raised while starting a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The provider is switched off.
    #[error("Position provider '{0}' is disabled")]
    Disabled(String),

    /// Failed to bind the UDP socket.
    #[error("Failed to bind UDP socket on port {port}: {source}")]
    SocketBind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a replay file.
    #[error("Failed to read replay file {path}: {source}")]
    ReplayFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A replay line could not be parsed.
    #[error("Invalid replay line {line}: {reason}")]
    ReplayParse { line: usize, reason: String },

    /// Background tasks need a running tokio runtime.
    #[error("Position source '{0}' must be started from within a tokio runtime")]
    NoRuntime(String),
}

/// Source driven by explicit calls.
///
/// Forwards whatever is pushed to the sink registered by `start()`. Pushes
/// while stopped are dropped, like platform callbacks after unregistering.
pub struct ManualSource {
    name: String,
    enabled: AtomicBool,
    sink: Mutex<Option<Arc<dyn FixSink>>>,
}

impl ManualSource {
    /// Create an enabled manual source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            sink: Mutex::new(None),
        }
    }

    /// Switch the simulated provider on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Returns true while a sink is registered.
    pub fn is_started(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Deliver a fix callback.
    pub fn push_fix(&self, fix: Option<RawFix>) {
        if let Some(sink) = self.current_sink() {
            sink.on_fix(fix);
        }
    }

    /// Deliver a status callback.
    pub fn push_status(&self, event: GpsEvent) {
        if let Some(sink) = self.current_sink() {
            sink.on_status(event);
        }
    }

    /// Simulate the platform silently dropping the listener registration.
    pub fn drop_registration(&self) {
        if let Some(sink) = self.sink.lock().take() {
            sink.on_status(GpsEvent::Stopped);
        }
    }

    // Clone out of the lock so callbacks never run while holding it.
    fn current_sink(&self) -> Option<Arc<dyn FixSink>> {
        self.sink.lock().clone()
    }
}

impl PositionSource for ManualSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn start(&self, sink: Arc<dyn FixSink>) -> Result<(), SourceError> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        self.sink.lock().take();
    }
}
