//! Position acquisition.
//!
//! Turns raw callbacks from a location sensor into a single observable
//! "current position" shared by any number of subscribers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  on_fix / on_status  ┌──────────────────┐
//! │  PositionSource  │ ───────────────────► │ PositionTracker  │
//! │ (replay, NMEA,   │                      │ current sample   │
//! │  manual)         │                      │ fix state        │
//! └──────────────────┘                      └────────┬─────────┘
//!                                                    │ fan-out
//!                              ┌─────────────────────┼──────────────┐
//!                              ▼                     ▼              ▼
//!                        TrackLogger          status display    updates()
//! ```
//!
//! [`TrackerContext`] owns the process-wide tracker and transparently
//! restarts it when the platform stops delivering callbacks.

mod context;
pub mod nmea;
mod replay;
mod source;
mod state;
mod tracker;

pub use context::TrackerContext;
pub use nmea::{NmeaSource, NmeaSourceConfig, DEFAULT_NMEA_PORT};
pub use replay::{
    parse_replay_log, ReplayConfig, ReplayEntry, ReplaySource, DEFAULT_FALLBACK_DELAY,
};
pub use source::{FixSink, ManualSource, PositionSource, SourceError};
pub use state::{FixState, GpsEvent, PositionSample, RawFix};
pub use tracker::{
    PositionListener, PositionTracker, TrackerConfig, DEFAULT_STALENESS_WINDOW,
};
