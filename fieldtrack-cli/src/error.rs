//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use fieldtrack::config::ConfigFileError;
use fieldtrack::position::SourceError;
use fieldtrack::track::{StoreError, TrackLogError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to start the async runtime or signal handler
    Runtime(String),
    /// Position source could not start
    Source(SourceError),
    /// Track database error
    Store(StoreError),
    /// Logger refused to arm
    Arm(TrackLogError),
    /// Session recording ended with a storage failure
    RecordingFailed(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Source(_) => 3,
            CliError::Store(_) | CliError::Arm(_) | CliError::RecordingFailed(_) => 4,
            CliError::LoggingInit(_) | CliError::Runtime(_) => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Source(SourceError::SocketBind { port, .. }) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Another program is already listening on UDP port {}", port);
                eprintln!("  2. Ports below 1024 need elevated privileges");
                eprintln!("Pick another port with --nmea-port or nmea_port in config.ini.");
            }
            CliError::Source(SourceError::ReplayFile { .. })
            | CliError::Source(SourceError::ReplayParse { .. }) => {
                eprintln!();
                eprintln!("Replay logs are CSV lines: time_ms,lon,lat,alt[,speed,accuracy]");
            }
            CliError::Store(StoreError::Exhausted(_))
            | CliError::RecordingFailed(_) => {
                eprintln!();
                eprintln!("Points recorded before the failure are kept in the database.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
            CliError::Source(e) => write!(f, "Position source error: {}", e),
            CliError::Store(e) => write!(f, "Track database error: {}", e),
            CliError::Arm(e) => write!(f, "Cannot start recording: {}", e),
            CliError::RecordingFailed(msg) => write!(f, "Recording stopped: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Source(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Arm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 2);
        assert_eq!(CliError::Source(SourceError::Disabled("nmea".into())).exit_code(), 3);
        assert_eq!(
            CliError::Store(StoreError::Exhausted("full".into())).exit_code(),
            4
        );
        assert_eq!(CliError::Runtime("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_display_wraps_library_errors() {
        let err = CliError::from(StoreError::SessionNotFound(7));
        assert_eq!(err.to_string(), "Track database error: Session 7 not found");
        assert!(std::error::Error::source(&err).is_some());
    }
}
