//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Track logging settings
    pub tracking: TrackingSettings,
    /// Position source settings
    pub position: PositionSettings,
    /// Track database settings
    pub storage: StorageSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Track logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSettings {
    /// Seconds between sampling iterations.
    pub sampling_interval: u64,
    /// Minimum distance in meters between accepted points.
    pub minimum_distance: f64,
    /// Milliseconds a fix stays current without status events.
    pub staleness_window_ms: u64,
}

/// Which position source to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSourceKind {
    /// Replay a recorded fake log.
    Replay,
    /// Listen for NMEA sentences over UDP.
    Nmea,
}

impl FromStr for PositionSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replay" => Ok(Self::Replay),
            "nmea" => Ok(Self::Nmea),
            other => Err(format!("unknown position source '{}'", other)),
        }
    }
}

impl fmt::Display for PositionSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replay => write!(f, "replay"),
            Self::Nmea => write!(f, "nmea"),
        }
    }
}

/// Position source configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSettings {
    pub source: PositionSourceKind,
    /// Fake log replayed by the replay source.
    pub replay_file: Option<PathBuf>,
    /// UDP port of the NMEA source.
    pub nmea_port: u16,
    /// Last accepted longitude, written through by the logger.
    pub last_longitude: Option<f64>,
    /// Last accepted latitude, written through by the logger.
    pub last_latitude: Option<f64>,
}

impl PositionSettings {
    /// Last known position as `(longitude, latitude)`, if both are set.
    pub fn last_known_position(&self) -> Option<(f64, f64)> {
        self.last_longitude.zip(self.last_latitude)
    }
}

/// Track database configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// SQLite database path
    pub database: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
