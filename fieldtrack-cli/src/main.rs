//! fieldtrack CLI - Command-line interface
//!
//! This binary records GPS tracks with the fieldtrack library and manages
//! the recorded sessions and the configuration file.

mod alerter;
mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::record::RecordArgs;
use commands::sessions::SessionsArgs;
use error::CliError;
use fieldtrack::track::SessionId;
use runner::{load_config, CliRunner};

#[derive(Parser)]
#[command(name = "fieldtrack")]
#[command(version = fieldtrack::VERSION)]
#[command(about = "Record GPS tracks from an NMEA feed or a replay log", long_about = None)]
struct Cli {
    /// Enable debug logging regardless of RUST_LOG
    #[arg(long, global = true)]
    debug: bool,

    /// Use this config file instead of ~/.fieldtrack/config.ini
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a track session until Ctrl-C
    Record {
        /// Session name (default: log_<date>_<time>)
        name: Option<String>,

        /// Replay this fake log instead of the configured source
        #[arg(long, value_name = "FILE", conflicts_with = "nmea_port")]
        replay: Option<PathBuf>,

        /// Listen for NMEA sentences on this UDP port
        #[arg(long, value_name = "PORT")]
        nmea_port: Option<u16>,

        /// Track database (default: [storage] database from config)
        #[arg(long, value_name = "FILE")]
        database: Option<PathBuf>,
    },

    /// List recorded sessions
    Sessions {
        /// Track database (default: [storage] database from config)
        #[arg(long, value_name = "FILE")]
        database: Option<PathBuf>,

        /// Print the points of one session as CSV
        #[arg(long, value_name = "ID")]
        points: Option<SessionId>,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Record {
            name,
            replay,
            nmea_port,
            database,
        } => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.debug)?;
            commands::record::run(
                RecordArgs {
                    name,
                    replay,
                    nmea_port,
                    database,
                },
                runner,
            )
        }
        Commands::Sessions { database, points } => {
            let (config, _) = load_config(cli.config.as_deref())?;
            commands::sessions::run(SessionsArgs { database, points }, &config)
        }
        Commands::Config { command } => {
            let path = cli
                .config
                .unwrap_or_else(fieldtrack::config::config_file_path);
            commands::config::run(command, &path)
        }
    }
}
