//! Reading and writing the tracking config file.
//!
//! The file lives at `~/.fieldtrack/config.ini` unless the CLI is pointed
//! elsewhere. A missing file is not an error: every key has a default, and
//! the track logger writes the last accepted position back into the same
//! file through [`super::IniTrackingSettings`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::ConfigFile;

/// Errors reading, validating or writing the config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("Failed to write config file: {0}")]
    Write(std::io::Error),

    /// A key holds a value that cannot be used, such as an unknown
    /// position source or a port outside the u16 range.
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to create config directory: {0}")]
    CreateDirectory(std::io::Error),
}

impl ConfigFile {
    /// Read `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Write every section to `path`, creating its directory first.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::CreateDirectory)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(ConfigFileError::Write)
    }

    /// Write a default config to `path` unless one is already there.
    ///
    /// Returns true if the file was created.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }
}

/// `~/.fieldtrack`, or `./.fieldtrack` without a home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fieldtrack")
}

/// Default location of `config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
