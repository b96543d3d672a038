//! Configuration management CLI commands.
//!
//! Provides `config show`, `config path` and `config init` for viewing the
//! effective settings and creating the config file.

use std::path::Path;

use clap::Subcommand;
use fieldtrack::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (file values over defaults)
    Show,

    /// Show the configuration file path
    Path,

    /// Create the configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(config_path),
        ConfigCommands::Path => run_path(config_path),
        ConfigCommands::Init { force } => run_init(config_path, force),
    }
}

/// Show the effective configuration.
fn run_show(config_path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(config_path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();
    for line in describe(&config) {
        println!("{}", line);
    }

    if !config_path.exists() {
        println!();
        println!("(defaults; no file at {})", config_path.display());
    }

    Ok(())
}

/// Show the configuration file path.
fn run_path(config_path: &Path) -> Result<(), CliError> {
    println!("{}", config_path.display());
    Ok(())
}

/// Create the config file.
fn run_init(config_path: &Path, force: bool) -> Result<(), CliError> {
    if force && config_path.exists() {
        ConfigFile::default().save_to(config_path)?;
        println!("Reset {}", config_path.display());
        return Ok(());
    }

    if ConfigFile::ensure_exists_at(config_path)? {
        println!("Created {}", config_path.display());
    } else {
        println!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    Ok(())
}

/// One `key = value` line per setting, grouped by section.
fn describe(config: &ConfigFile) -> Vec<String> {
    let optional = |value: Option<f64>| {
        value
            .map(|v| format!("{:.7}", v))
            .unwrap_or_else(|| "(not set)".to_string())
    };
    let position = &config.position;

    vec![
        "[tracking]".to_string(),
        format!(
            "  sampling_interval   = {} s",
            config.tracking.sampling_interval
        ),
        format!(
            "  minimum_distance    = {} m",
            config.tracking.minimum_distance
        ),
        format!(
            "  staleness_window_ms = {}",
            config.tracking.staleness_window_ms
        ),
        String::new(),
        "[position]".to_string(),
        format!("  source              = {}", position.source),
        format!(
            "  replay_file         = {}",
            position
                .replay_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string())
        ),
        format!("  nmea_port           = {}", position.nmea_port),
        format!(
            "  last_longitude      = {}",
            optional(position.last_longitude)
        ),
        format!(
            "  last_latitude       = {}",
            optional(position.last_latitude)
        ),
        String::new(),
        "[storage]".to_string(),
        format!(
            "  database            = {}",
            config.storage.database.display()
        ),
        String::new(),
        "[logging]".to_string(),
        format!("  file                = {}", config.logging.file.display()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_then_keeps() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        run_init(&path, false).unwrap();
        assert!(path.exists());

        let mut config = ConfigFile::load_from(&path).unwrap();
        config.tracking.sampling_interval = 10;
        config.save_to(&path).unwrap();

        run_init(&path, false).unwrap();
        assert_eq!(
            ConfigFile::load_from(&path).unwrap().tracking.sampling_interval,
            10
        );

        run_init(&path, true).unwrap();
        assert_eq!(
            ConfigFile::load_from(&path).unwrap().tracking.sampling_interval,
            3
        );
    }

    #[test]
    fn test_describe_lists_every_section() {
        let lines = describe(&ConfigFile::default());
        for section in ["[tracking]", "[position]", "[storage]", "[logging]"] {
            assert!(lines.iter().any(|l| l == section), "missing {}", section);
        }
        assert!(lines.iter().any(|l| l.contains("nmea_port") && l.contains("10110")));
        assert!(lines
            .iter()
            .any(|l| l.contains("last_latitude") && l.contains("(not set)")));
    }
}
