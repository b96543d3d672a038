//! Core state types for position tracking.
//!
//! - [`RawFix`] - One position report as delivered by a source
//! - [`PositionSample`] - Published snapshot with a link to the previous fix
//! - [`FixState`] - Is positioning currently reliable?
//! - [`GpsEvent`] - Status events emitted by a source

use chrono::{DateTime, Utc};

use crate::geo;

/// A single position report from a location sensor.
///
/// Plain value type: no history, no metadata about how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,

    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,

    /// Altitude in meters above the ellipsoid (0.0 when unknown).
    pub altitude: f64,

    /// When the sensor measured this position.
    pub timestamp: DateTime<Utc>,
}

impl RawFix {
    /// Create a fix measured now.
    pub fn now(longitude: f64, latitude: f64, altitude: f64) -> Self {
        Self::at(longitude, latitude, altitude, Utc::now())
    }

    /// Create a fix with an explicit measurement time.
    pub fn at(longitude: f64, latitude: f64, altitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            longitude,
            latitude,
            altitude,
            timestamp,
        }
    }

    /// Position as `(latitude, longitude)`.
    #[inline]
    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }

    /// Great-circle distance to another fix in meters.
    pub fn distance_to(&self, other: &RawFix) -> f64 {
        geo::distance_m(self.position(), other.position())
    }

    /// Returns true if the coordinates are inside the valid WGS-84 range.
    pub fn is_valid(&self) -> bool {
        geo::is_valid_coordinate(self.latitude, self.longitude)
    }
}

/// Immutable position snapshot published by the tracker.
///
/// Each sample carries the fix that preceded it so consumers can derive
/// direction or step length without keeping their own history. The link is
/// one level deep: `previous` is a plain [`RawFix`], never another sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    /// The fix this sample was built from.
    pub fix: RawFix,

    /// The fix delivered immediately before this one, if any.
    pub previous: Option<RawFix>,
}

impl PositionSample {
    /// Create a sample from a fix and its predecessor.
    pub fn new(fix: RawFix, previous: Option<RawFix>) -> Self {
        Self { fix, previous }
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.fix.longitude
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.fix.latitude
    }

    #[inline]
    pub fn altitude(&self) -> f64 {
        self.fix.altitude
    }

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.fix.timestamp
    }

    /// Distance to another sample in meters.
    pub fn distance_to(&self, other: &PositionSample) -> f64 {
        self.fix.distance_to(&other.fix)
    }

    /// Distance covered since the previous fix (0 for the first sample).
    pub fn step_distance(&self) -> f64 {
        self.previous
            .map(|prev| prev.distance_to(&self.fix))
            .unwrap_or(0.0)
    }
}

/// Fix quality as derived from source signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixState {
    /// Provider disabled or tracker not listening.
    #[default]
    Off,
    /// Listening, but no reliable fix.
    ListeningNoFix,
    /// Receiving current fixes.
    Fix,
}

impl std::fmt::Display for FixState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::ListeningNoFix => write!(f, "No fix"),
            Self::Fix => write!(f, "Fix"),
        }
    }
}

/// Status events a source can raise besides fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsEvent {
    /// The receiver acquired its first fix since starting.
    FirstFix,
    /// Periodic satellite status report.
    SatelliteStatus,
    /// The platform stopped the source without being asked to.
    Stopped,
}
