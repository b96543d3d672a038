//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (show, path, init)
//! - [`record`] - Record a track session until Ctrl-C
//! - [`sessions`] - List recorded sessions and dump their points

pub mod config;
pub mod record;
pub mod sessions;
