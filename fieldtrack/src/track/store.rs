//! Persistent track store abstraction.
//!
//! The logger only needs session bookkeeping plus append-only points. Every
//! call is synchronous; the logger runs them on the blocking pool.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::session::{LogPoint, SessionId, SessionSummary};

/// Errors raised by a track store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The medium is full. Nothing more can be written.
    #[error("Storage exhausted: {0}")]
    Exhausted(String),

    /// Any other write failure.
    #[error("Track store write failed: {0}")]
    Write(String),

    /// The session does not exist (never opened or already deleted).
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),
}

impl StoreError {
    /// Returns true if retrying cannot help.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}

/// Durable storage for track sessions.
pub trait PersistentTrackStore: Send + Sync {
    /// Create a session and return its identifier.
    fn open_session(&self, name: &str, created_at: DateTime<Utc>) -> Result<SessionId, StoreError>;

    /// Append one point. Each call is its own transaction.
    fn append_point(&self, session: SessionId, point: &LogPoint) -> Result<(), StoreError>;

    /// Finalize a session with its end time.
    fn close_session(&self, session: SessionId, ended_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Delete a session and all of its points.
    fn delete_session(&self, session: SessionId) -> Result<(), StoreError>;

    /// Record the track length of a session.
    fn set_session_length(&self, _session: SessionId, _meters: f64) -> Result<(), StoreError> {
        Ok(())
    }

    /// List stored sessions, oldest first.
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        Ok(Vec::new())
    }
}
