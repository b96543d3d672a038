//! Process-wide owner of the position tracker.
//!
//! The platform may silently stop delivering callbacks (for example when the
//! location service is restarted). Handing out the dead tracker would leave
//! every subscriber waiting forever, so [`TrackerContext::tracker`] checks the
//! listening flag and replaces a stopped tracker with a fresh one, carrying
//! its subscribers over.

use std::sync::Arc;

use parking_lot::Mutex;

use super::source::{PositionSource, SourceError};
use super::tracker::{PositionTracker, TrackerConfig};

/// Guarded get-or-create holder for the single [`PositionTracker`].
pub struct TrackerContext {
    source: Arc<dyn PositionSource>,
    config: TrackerConfig,
    tracker: Mutex<Option<PositionTracker>>,
}

impl TrackerContext {
    /// Create a context over `source`. No tracker exists until first use.
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self::with_config(source, TrackerConfig::default())
    }

    /// Create with custom tracker configuration.
    pub fn with_config(source: Arc<dyn PositionSource>, config: TrackerConfig) -> Self {
        Self {
            source,
            config,
            tracker: Mutex::new(None),
        }
    }

    /// Return the live tracker, creating or restarting it when needed.
    ///
    /// Concurrent callers are serialized; all of them receive the same
    /// instance.
    pub fn tracker(&self) -> Result<PositionTracker, SourceError> {
        let mut slot = self.tracker.lock();

        if let Some(existing) = slot.as_ref() {
            if existing.is_listening() {
                return Ok(existing.clone());
            }
        }

        let fresh = PositionTracker::with_config(Arc::clone(&self.source), self.config.clone());
        if let Some(stale) = slot.take() {
            tracing::info!(
                source = self.source.name(),
                subscribers = stale.subscriber_count(),
                "Position tracker stopped listening, restarting"
            );
            stale.stop_listening();
            for listener in stale.listeners_snapshot() {
                fresh.subscribe(listener);
            }
        }

        fresh.start_listening()?;
        *slot = Some(fresh.clone());
        Ok(fresh)
    }

    /// Return the current tracker without creating one.
    pub fn existing(&self) -> Option<PositionTracker> {
        self.tracker.lock().clone()
    }

    /// Stop the tracker, if any, and forget it.
    pub fn shutdown(&self) {
        if let Some(tracker) = self.tracker.lock().take() {
            tracker.stop_listening();
        }
    }
}
