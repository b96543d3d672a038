//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::position::DEFAULT_NMEA_PORT;

// =============================================================================
// Tracking defaults
// =============================================================================

/// Default seconds between sampling iterations.
pub const DEFAULT_SAMPLING_INTERVAL_SECS: u64 = 3;

/// Default minimum distance between accepted points in meters.
pub const DEFAULT_MINIMUM_DISTANCE_M: f64 = 1.0;

/// Default fix staleness window in milliseconds.
pub const DEFAULT_STALENESS_WINDOW_MS: u64 = 3000;

// =============================================================================
// File defaults
// =============================================================================

/// Default track database file name inside the config directory.
pub const DEFAULT_DATABASE_FILE: &str = "tracks.db";

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "fieldtrack.log";

/// Default track database path (~/.fieldtrack/tracks.db).
pub fn default_database_path() -> PathBuf {
    config_directory().join(DEFAULT_DATABASE_FILE)
}

/// Default log file path (~/.fieldtrack/fieldtrack.log).
pub fn default_log_path() -> PathBuf {
    config_directory().join(DEFAULT_LOG_FILE)
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            sampling_interval: DEFAULT_SAMPLING_INTERVAL_SECS,
            minimum_distance: DEFAULT_MINIMUM_DISTANCE_M,
            staleness_window_ms: DEFAULT_STALENESS_WINDOW_MS,
        }
    }
}

impl Default for PositionSettings {
    fn default() -> Self {
        Self {
            source: PositionSourceKind::Nmea,
            replay_file: None,
            nmea_port: DEFAULT_NMEA_PORT,
            last_longitude: None,
            last_latitude: None,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tracking: TrackingSettings::default(),
            position: PositionSettings::default(),
            storage: StorageSettings {
                database: default_database_path(),
            },
            logging: LoggingSettings {
                file: default_log_path(),
            },
        }
    }
}
