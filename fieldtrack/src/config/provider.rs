//! Settings collaborator for the track logger.
//!
//! The logger reads its sampling parameters when a session starts and writes
//! every accepted position back so the next start has a warm position.
//! Read failures never reach the logger: implementations substitute
//! defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::defaults::{DEFAULT_MINIMUM_DISTANCE_M, DEFAULT_SAMPLING_INTERVAL_SECS};
use super::file::{config_file_path, ConfigFileError};
use super::settings::ConfigFile;

/// Source of tracking parameters.
pub trait SettingsProvider: Send + Sync {
    /// Seconds between sampling iterations.
    fn sampling_interval_secs(&self) -> u64;

    /// Minimum distance in meters between accepted points.
    fn minimum_distance_meters(&self) -> f64;

    /// Remember the last accepted position.
    fn set_last_known_position(&self, longitude: f64, latitude: f64)
        -> Result<(), ConfigFileError>;

    /// Sampling interval as a duration.
    fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_secs())
    }
}

/// Settings backed by the INI config file.
///
/// The file is re-read on every call so edits take effect with the next
/// session. Writes go through a lock so concurrent updates don't interleave.
#[derive(Debug)]
pub struct IniTrackingSettings {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl IniTrackingSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Settings at the default config path.
    pub fn at_default_path() -> Self {
        Self::new(config_file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_or_default(&self) -> ConfigFile {
        match ConfigFile::load_from(&self.path) {
            Ok(config) => config,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Config unreadable, using defaults");
                ConfigFile::default()
            }
        }
    }
}

impl SettingsProvider for IniTrackingSettings {
    fn sampling_interval_secs(&self) -> u64 {
        self.load_or_default().tracking.sampling_interval
    }

    fn minimum_distance_meters(&self) -> f64 {
        self.load_or_default().tracking.minimum_distance
    }

    fn set_last_known_position(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> Result<(), ConfigFileError> {
        let _guard = self.write_lock.lock();
        // Refuse to overwrite a file we cannot parse.
        let mut config = ConfigFile::load_from(&self.path)?;
        config.position.last_longitude = Some(longitude);
        config.position.last_latitude = Some(latitude);
        config.save_to(&self.path)
    }
}

/// In-memory settings.
#[derive(Debug)]
pub struct MemorySettings {
    interval: Duration,
    minimum_distance: f64,
    last_position: Mutex<Option<(f64, f64)>>,
}

impl MemorySettings {
    pub fn new(interval: Duration, minimum_distance: f64) -> Self {
        Self {
            interval,
            minimum_distance,
            last_position: Mutex::new(None),
        }
    }

    /// Last position written by the logger as `(longitude, latitude)`.
    pub fn last_known_position(&self) -> Option<(f64, f64)> {
        *self.last_position.lock()
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_SAMPLING_INTERVAL_SECS),
            DEFAULT_MINIMUM_DISTANCE_M,
        )
    }
}

impl SettingsProvider for MemorySettings {
    fn sampling_interval_secs(&self) -> u64 {
        self.interval.as_secs()
    }

    fn minimum_distance_meters(&self) -> f64 {
        self.minimum_distance
    }

    fn set_last_known_position(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> Result<(), ConfigFileError> {
        *self.last_position.lock() = Some((longitude, latitude));
        Ok(())
    }

    fn sampling_interval(&self) -> Duration {
        self.interval
    }
}
