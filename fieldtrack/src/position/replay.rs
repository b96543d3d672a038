//! Replay source - plays back a recorded fake log.
//!
//! Used when no receiver is available (desk testing, demos). The log is a
//! CSV file with one fix per line:
//!
//! ```text
//! time_ms,lon,lat,alt[,speed,accuracy]
//! ```
//!
//! Fixes are replayed at the recorded time deltas. When a delta is missing
//! or negative (the first line, or wrapping around) the fallback delay of
//! 2 seconds applies. Playback loops until the source is stopped.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::source::{FixSink, PositionSource, SourceError};
use super::state::{GpsEvent, RawFix};

/// Delay used when the log gives no usable time delta.
pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_secs(2);

/// One line of a replay log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayEntry {
    /// Recording time in milliseconds.
    pub time_ms: i64,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
}

impl ReplayEntry {
    pub fn new(time_ms: i64, longitude: f64, latitude: f64, altitude: f64) -> Self {
        Self {
            time_ms,
            longitude,
            latitude,
            altitude,
        }
    }
}

/// Replay playback configuration.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Delay when the recorded delta is missing or negative.
    pub fallback_delay: Duration,

    /// Start over when the log is exhausted.
    pub looping: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            fallback_delay: DEFAULT_FALLBACK_DELAY,
            looping: true,
        }
    }
}

/// Parse replay log text.
///
/// Blank lines and lines starting with `#` are skipped. Speed and accuracy
/// columns are accepted but not used.
pub fn parse_replay_log(text: &str) -> Result<Vec<ReplayEntry>, SourceError> {
    let mut entries = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line_no = index + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            return Err(SourceError::ReplayParse {
                line: line_no,
                reason: format!("expected at least 4 fields, found {}", fields.len()),
            });
        }

        let parse_err = |name: &str, value: &str| SourceError::ReplayParse {
            line: line_no,
            reason: format!("invalid {}: '{}'", name, value),
        };

        let time_ms = fields[0]
            .parse::<i64>()
            .map_err(|_| parse_err("time", fields[0]))?;
        let longitude = fields[1]
            .parse::<f64>()
            .map_err(|_| parse_err("longitude", fields[1]))?;
        let latitude = fields[2]
            .parse::<f64>()
            .map_err(|_| parse_err("latitude", fields[2]))?;
        let altitude = fields[3]
            .parse::<f64>()
            .map_err(|_| parse_err("altitude", fields[3]))?;

        entries.push(ReplayEntry::new(time_ms, longitude, latitude, altitude));
    }

    Ok(entries)
}

/// Source that replays a fake log on a background task.
pub struct ReplaySource {
    name: String,
    entries: Arc<Vec<ReplayEntry>>,
    config: ReplayConfig,
    enabled: AtomicBool,
    running: Mutex<Option<CancellationToken>>,
}

impl ReplaySource {
    /// Create a replay source over in-memory entries.
    pub fn new(entries: Vec<ReplayEntry>) -> Self {
        Self::with_config(entries, ReplayConfig::default())
    }

    /// Create with custom playback configuration.
    pub fn with_config(entries: Vec<ReplayEntry>, config: ReplayConfig) -> Self {
        Self {
            name: "replay".to_string(),
            entries: Arc::new(entries),
            config,
            enabled: AtomicBool::new(true),
            running: Mutex::new(None),
        }
    }

    /// Load a replay log from disk.
    pub fn from_file(path: &Path, config: ReplayConfig) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|e| SourceError::ReplayFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let entries = parse_replay_log(&text)?;
        info!(path = %path.display(), fixes = entries.len(), "Loaded replay log");
        Ok(Self::with_config(entries, config))
    }

    /// Number of fixes in the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the log holds no fixes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true while playback is running.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

impl PositionSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn start(&self, sink: Arc<dyn FixSink>) -> Result<(), SourceError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| SourceError::NoRuntime(self.name.clone()))?;

        let token = CancellationToken::new();
        if let Some(previous) = self.running.lock().replace(token.clone()) {
            previous.cancel();
        }

        handle.spawn(run_replay(
            Arc::clone(&self.entries),
            self.config.clone(),
            sink,
            token,
        ));
        Ok(())
    }

    fn stop(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
        }
    }
}

async fn run_replay(
    entries: Arc<Vec<ReplayEntry>>,
    config: ReplayConfig,
    sink: Arc<dyn FixSink>,
    cancellation: CancellationToken,
) {
    if entries.is_empty() {
        info!("Replay log is empty, nothing to play");
        return;
    }

    info!(fixes = entries.len(), looping = config.looping, "Replay started");

    let mut delivered: u64 = 0;
    let mut index = 0usize;

    loop {
        if cancellation.is_cancelled() {
            break;
        }

        let entry = entries[index];
        sink.on_fix(Some(RawFix::now(
            entry.longitude,
            entry.latitude,
            entry.altitude,
        )));
        if delivered == 0 {
            sink.on_status(GpsEvent::FirstFix);
        }
        sink.on_status(GpsEvent::SatelliteStatus);
        delivered += 1;

        let next = index + 1;
        if next >= entries.len() && !config.looping {
            debug!(delivered, "Replay log exhausted");
            break;
        }
        let next = next % entries.len();

        let delta = entries[next].time_ms - entry.time_ms;
        let delay = if delta > 0 {
            Duration::from_millis(delta as u64)
        } else {
            config.fallback_delay
        };
        index = next;

        tokio::select! {
            _ = cancellation.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!(delivered, "Replay stopped");
}
