//! Track logging.
//!
//! [`TrackLogger`] subscribes to the [`PositionTracker`](crate::position::PositionTracker),
//! filters positions by distance and persists them through a
//! [`PersistentTrackStore`] as one session per recording.
//!
//! Two stores ship with the crate:
//! - [`SqliteTrackStore`] - durable, used by the CLI
//! - [`MemoryTrackStore`] - in memory, with a call journal
//!
//! Failures are reported through the [`Alerter`] hooks and the
//! [`TrackLogEvent`] channel; nothing propagates out of the logger.

mod alert;
mod events;
mod logger;
mod memory;
mod session;
mod sqlite;
mod store;

pub use alert::{raise_alarm, Acknowledgement, Alerter, LogAlerter, DEFAULT_ALARM_DELAY};
pub use events::TrackLogEvent;
pub use logger::{LoggerConfig, LoggerPhase, TrackLogError, TrackLogger, MIN_SESSION_POINTS};
pub use memory::{MemoryTrackStore, StoreOp};
pub use session::{
    default_session_name, LogPoint, LoggingSession, SessionId, SessionSummary,
    DEFAULT_NAME_PREFIX,
};
pub use sqlite::SqliteTrackStore;
pub use store::{PersistentTrackStore, StoreError};
