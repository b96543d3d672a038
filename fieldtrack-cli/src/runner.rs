//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and construction of
//! the position source and track store, so command handlers stay small.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use fieldtrack::config::{config_file_path, ConfigFile, IniTrackingSettings, PositionSourceKind};
use fieldtrack::logging::{init_logging, LoggingGuard, LoggingOptions};
use fieldtrack::position::{
    NmeaSource, NmeaSourceConfig, PositionSource, ReplayConfig, ReplaySource, TrackerConfig,
};
use fieldtrack::track::SqliteTrackStore;

use crate::error::CliError;

/// Position source overrides from the command line.
#[derive(Debug, Default, Clone)]
pub struct SourceOverrides {
    pub replay: Option<PathBuf>,
    pub nmea_port: Option<u16>,
}

/// Load the config file at `path`, or the default path.
pub fn load_config(path: Option<&Path>) -> Result<(ConfigFile, PathBuf), CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    let config = ConfigFile::load_from(&path)?;
    Ok((config, path))
}

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
    /// Where the configuration was loaded from
    config_path: PathBuf,
}

impl CliRunner {
    /// Create a runner, loading config and initializing logging.
    ///
    /// When stdout is a terminal, console logging is disabled so it does not
    /// interleave with the progress output.
    pub fn new(config_path: Option<&Path>, debug: bool) -> Result<Self, CliError> {
        let (config, config_path) = load_config(config_path)?;

        let options = LoggingOptions {
            debug,
            quiet: std::io::stdout().is_terminal(),
        };
        let logging_guard = init_logging(&config.logging.file, options)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("fieldtrack v{}", fieldtrack::VERSION);
        info!(config = %self.config_path.display(), "fieldtrack CLI: {} command", command);
    }

    /// Settings collaborator backed by the loaded config file.
    pub fn tracking_settings(&self) -> Arc<IniTrackingSettings> {
        Arc::new(IniTrackingSettings::new(&self.config_path))
    }

    /// Tracker configuration from `[tracking]`.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            staleness_window: Duration::from_millis(self.config.tracking.staleness_window_ms),
            ..Default::default()
        }
    }

    /// Build the position source: CLI overrides first, then `[position]`.
    pub fn create_source(
        &self,
        overrides: &SourceOverrides,
    ) -> Result<Arc<dyn PositionSource>, CliError> {
        let position = &self.config.position;

        let kind = if overrides.replay.is_some() {
            PositionSourceKind::Replay
        } else if overrides.nmea_port.is_some() {
            PositionSourceKind::Nmea
        } else {
            position.source
        };

        match kind {
            PositionSourceKind::Replay => {
                let path = overrides
                    .replay
                    .clone()
                    .or_else(|| position.replay_file.clone())
                    .ok_or_else(|| {
                        CliError::Config(
                            "Replay source needs a log file. \
                             Set replay_file in config.ini or use --replay"
                                .to_string(),
                        )
                    })?;
                let source = ReplaySource::from_file(&path, ReplayConfig::default())?;
                info!(path = %path.display(), entries = source.len(), "Using replay source");
                Ok(Arc::new(source))
            }
            PositionSourceKind::Nmea => {
                let port = overrides.nmea_port.unwrap_or(position.nmea_port);
                info!(port, "Using NMEA UDP source");
                Ok(Arc::new(NmeaSource::new(NmeaSourceConfig {
                    port,
                    ..Default::default()
                })))
            }
        }
    }

    /// Open the track database, `database` overriding `[storage]`.
    pub fn open_store(&self, database: Option<&Path>) -> Result<Arc<SqliteTrackStore>, CliError> {
        let path = database.unwrap_or(self.config.storage.database.as_path());
        Ok(Arc::new(SqliteTrackStore::open(path)?))
    }
}
