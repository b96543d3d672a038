//! Events published by the track logger.

use super::session::SessionId;

/// Lifecycle and failure notifications from a [`super::TrackLogger`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackLogEvent {
    /// A session was opened and the worker started.
    Started { session: SessionId, name: String },

    /// A point was committed.
    PointAccepted {
        session: SessionId,
        points: u64,
        distance_meters: f64,
    },

    /// The worker finished a graceful stop.
    ///
    /// `kept` is false when the session had too few points and was deleted.
    Stopped {
        session: SessionId,
        points: u64,
        kept: bool,
    },

    /// The store ran out of space. The session is abandoned; points already
    /// committed remain.
    StorageExhausted { session: SessionId, message: String },

    /// Any other store failure. The session is abandoned.
    WriteFailed { session: SessionId, message: String },

    /// The wait between samples was interrupted; logging continues.
    WaitInterrupted { session: SessionId },
}

impl TrackLogEvent {
    /// Returns true for events that end the session abnormally.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::StorageExhausted { .. } | Self::WriteFailed { .. }
        )
    }
}
