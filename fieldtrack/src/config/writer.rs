//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let replay_file = config
        .position
        .replay_file
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();
    let last_longitude = config
        .position
        .last_longitude
        .map(|v| format!("{:.7}", v))
        .unwrap_or_default();
    let last_latitude = config
        .position
        .last_latitude
        .map(|v| format!("{:.7}", v))
        .unwrap_or_default();

    format!(
        r#"[tracking]
; Seconds between two sampling iterations of the track logger (default: 3)
sampling_interval = {}
; Minimum distance in meters between two recorded points (default: 1.0)
; Points closer than this to the last recorded point are skipped
minimum_distance = {}
; Milliseconds a fix stays valid without receiver status events (default: 3000)
staleness_window_ms = {}

[position]
; Position source:
;   nmea   - NMEA-0183 sentences received over UDP (GPS receiver, phone app)
;   replay - Replay a recorded log (time_ms,lon,lat,alt[,speed,accuracy] per line)
source = {}
; Log replayed by the replay source
replay_file = {}
; UDP port the NMEA source listens on (default: 10110)
nmea_port = {}
; Last recorded position, updated while logging
last_longitude = {}
last_latitude = {}

[storage]
; SQLite database holding recorded tracks
database = {}

[logging]
; Log file (cleared on each start)
file = {}
"#,
        config.tracking.sampling_interval,
        config.tracking.minimum_distance,
        config.tracking.staleness_window_ms,
        config.position.source,
        replay_file,
        config.position.nmea_port,
        last_longitude,
        last_latitude,
        path_to_string(&config.storage.database),
        path_to_string(&config.logging.file),
    )
}

/// Render a path, abbreviating the home directory as `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::{ConfigFile, PositionSourceKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.tracking.sampling_interval = 7;
        config.tracking.minimum_distance = 2.5;
        config.position.source = PositionSourceKind::Replay;
        config.position.replay_file = Some(PathBuf::from("/data/walk.csv"));
        config.position.last_longitude = Some(11.3548123);
        config.position.last_latitude = Some(46.4983456);
        config.storage.database = PathBuf::from("/data/tracks.db");

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_template_is_commented() {
        let content = super::to_config_string(&ConfigFile::default());
        assert!(content.contains("[tracking]"));
        assert!(content.contains("; Minimum distance in meters"));
        assert!(content.contains("sampling_interval = 3"));
        assert!(content.contains("last_longitude = \n"));
    }
}
