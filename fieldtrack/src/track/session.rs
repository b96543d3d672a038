//! Session and point types.

use chrono::{DateTime, Local, Utc};

use crate::geo;
use crate::position::PositionSample;

/// Identifier allocated by the store when a session is opened.
pub type SessionId = i64;

/// Prefix of generated session names.
pub const DEFAULT_NAME_PREFIX: &str = "log_";

/// Build the default session name for a start time, in local time.
///
/// ```
/// use chrono::{Local, TimeZone};
/// use fieldtrack::track::default_session_name;
///
/// let start = Local.with_ymd_and_hms(2024, 5, 17, 8, 30, 5).unwrap();
/// assert_eq!(default_session_name(start.into()), "log_20240517_083005");
/// ```
pub fn default_session_name(started_at: DateTime<Utc>) -> String {
    let local: DateTime<Local> = started_at.into();
    format!("{}{}", DEFAULT_NAME_PREFIX, local.format("%Y%m%d_%H%M%S"))
}

/// One persisted track point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl LogPoint {
    pub fn new(longitude: f64, latitude: f64, altitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            longitude,
            latitude,
            altitude,
            timestamp,
        }
    }

    /// Returns true if the coordinates can be stored.
    pub fn is_valid(&self) -> bool {
        geo::is_valid_coordinate(self.latitude, self.longitude)
    }
}

impl From<&PositionSample> for LogPoint {
    fn from(sample: &PositionSample) -> Self {
        Self::new(
            sample.longitude(),
            sample.latitude(),
            sample.altitude(),
            sample.timestamp(),
        )
    }
}

/// Bookkeeping for the session owned by an armed logger.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSession {
    pub id: SessionId,
    pub name: String,
    pub started_at: DateTime<Utc>,
    /// Set only on graceful stop.
    pub ended_at: Option<DateTime<Utc>>,
    pub accepted_points: u64,
    pub distance_meters: f64,
}

impl LoggingSession {
    pub fn new(id: SessionId, name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            started_at,
            ended_at: None,
            accepted_points: 0,
            distance_meters: 0.0,
        }
    }
}

/// Stored session as listed by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub length_meters: f64,
    pub point_count: u64,
}

impl SessionSummary {
    /// Returns true if the session was finalized.
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}
