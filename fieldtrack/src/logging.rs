//! Logging infrastructure for fieldtrack.
//!
//! Provides structured logging with file output and console output:
//! - Writes to the configured log file (cleared on start)
//! - Also prints to stdout unless quiet
//! - Configurable via the RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Logging options.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOptions {
    /// Force debug level regardless of RUST_LOG.
    pub debug: bool,
    /// Log to the file only.
    pub quiet: bool,
}

/// Initialize logging.
///
/// Creates the log file's directory if needed, clears the previous log file,
/// and sets up output to the file and (unless quiet) stdout.
///
/// # Errors
///
/// Returns error if the directory cannot be created or the file cannot be
/// cleared.
pub fn init_logging(log_path: &Path, options: LoggingOptions) -> Result<LoggingGuard, io::Error> {
    let log_dir = match log_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let log_file = log_path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;

    fs::create_dir_all(log_dir)?;
    fs::write(log_path, "")?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    let stdout_layer = (!options.quiet).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter(options.debug))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Build the level filter: `debug` wins, then RUST_LOG, then info.
fn env_filter(debug: bool) -> EnvFilter {
    if debug {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
