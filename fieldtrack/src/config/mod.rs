//! Configuration for fieldtrack.
//!
//! User configuration lives in `~/.fieldtrack/config.ini`:
//!
//! ```ini
//! [tracking]
//! sampling_interval = 3
//! minimum_distance = 1.0
//!
//! [position]
//! source = nmea
//! nmea_port = 10110
//! ```
//!
//! [`ConfigFile`] loads and saves the whole file. [`SettingsProvider`] is
//! the narrow view the track logger needs.
//!
//! # Example
//!
//! ```
//! use fieldtrack::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.tracking.sampling_interval, 3);
//! ```

mod defaults;
mod file;
mod parser;
mod provider;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use provider::{IniTrackingSettings, MemorySettings, SettingsProvider};
pub use settings::{
    ConfigFile, LoggingSettings, PositionSettings, PositionSourceKind, StorageSettings,
    TrackingSettings,
};
