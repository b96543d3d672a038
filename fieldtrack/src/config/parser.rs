//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.
//!
//! The `[tracking]` section is lenient: a bad value is logged and replaced
//! by its default, so a typo never stops a recording. Other sections reject
//! invalid values.

use std::path::PathBuf;

use ini::{Ini, Properties};
use tracing::warn;

use super::defaults::*;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tracking] section
    if let Some(section) = ini.section(Some("tracking")) {
        config.tracking.sampling_interval = lenient(
            section,
            "sampling_interval",
            DEFAULT_SAMPLING_INTERVAL_SECS,
            |v: &u64| *v >= 1,
        );
        config.tracking.minimum_distance = lenient(
            section,
            "minimum_distance",
            DEFAULT_MINIMUM_DISTANCE_M,
            |v: &f64| v.is_finite() && *v >= 0.0,
        );
        config.tracking.staleness_window_ms = lenient(
            section,
            "staleness_window_ms",
            DEFAULT_STALENESS_WINDOW_MS,
            |v: &u64| *v >= 1,
        );
    }

    // [position] section
    if let Some(section) = ini.section(Some("position")) {
        if let Some(v) = section.get("source") {
            config.position.source = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "position".to_string(),
                key: "source".to_string(),
                value: v.to_string(),
                reason: "must be 'replay' or 'nmea'".to_string(),
            })?;
        }
        if let Some(v) = section.get("replay_file") {
            let v = v.trim();
            if !v.is_empty() {
                config.position.replay_file = Some(expand_tilde(v));
            }
        }
        if let Some(v) = section.get("nmea_port") {
            config.position.nmea_port = v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "position".to_string(),
                key: "nmea_port".to_string(),
                value: v.to_string(),
                reason: "must be a port number (0-65535)".to_string(),
            })?;
        }
        config.position.last_longitude = optional_coordinate(section, "last_longitude", 180.0)?;
        config.position.last_latitude = optional_coordinate(section, "last_latitude", 90.0)?;
    }

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("database") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.database = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Read a value, falling back to `default` with a warning when it is
/// unparseable or fails `valid`.
fn lenient<T, F>(section: &Properties, key: &str, default: T, valid: F) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
    F: Fn(&T) -> bool,
{
    let Some(raw) = section.get(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        _ => {
            warn!(
                key,
                value = raw,
                default = %default,
                "Invalid tracking setting, using default"
            );
            default
        }
    }
}

fn optional_coordinate(
    section: &Properties,
    key: &str,
    limit: f64,
) -> Result<Option<f64>, ConfigFileError> {
    let Some(raw) = section.get(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Ok(Some(v)),
        _ => Err(ConfigFileError::InvalidValue {
            section: "position".to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: format!("must be a number between -{} and {}", limit, limit),
        }),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
