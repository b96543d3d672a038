//! fieldtrack - position acquisition and track logging
//!
//! This library turns a stream of raw position fixes into a shared "current
//! position" and records filtered tracks into a persistent store.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use fieldtrack::config::IniTrackingSettings;
//! use fieldtrack::position::{NmeaSource, TrackerContext};
//! use fieldtrack::track::{LogAlerter, SqliteTrackStore, TrackLogger};
//!
//! let context = Arc::new(TrackerContext::new(Arc::new(NmeaSource::with_defaults())));
//!
//! let store = Arc::new(SqliteTrackStore::open(path)?);
//! let settings = Arc::new(IniTrackingSettings::at_default_path());
//! let logger = TrackLogger::new(context, store, settings, Arc::new(LogAlerter));
//!
//! logger.arm(Some("morning walk"))?;
//! // ...
//! logger.disarm();
//! logger.wait_stopped().await;
//! ```

pub mod config;
pub mod geo;
pub mod logging;
pub mod position;
pub mod track;

/// Version of the fieldtrack library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
