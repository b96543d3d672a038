//! Record command - arm the track logger until Ctrl-C.
//!
//! Starts the configured position source, records one session into the
//! track database and prints a line per stored point. On a storage failure
//! the terminal alerter takes over and the command waits for the user to
//! acknowledge before exiting.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tracing::{info, warn};

use fieldtrack::position::TrackerContext;
use fieldtrack::track::{Alerter, TrackLogEvent, TrackLogger};

use crate::alerter::TerminalAlerter;
use crate::error::CliError;
use crate::runner::{CliRunner, SourceOverrides};

/// Arguments for the record command.
pub struct RecordArgs {
    pub name: Option<String>,
    pub replay: Option<PathBuf>,
    pub nmea_port: Option<u16>,
    pub database: Option<PathBuf>,
}

/// How the recording loop ended.
enum Outcome {
    Interrupted,
    Failed(String),
}

/// Run the record command.
pub fn run(args: RecordArgs, runner: CliRunner) -> Result<(), CliError> {
    runner.log_startup("record");

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("Failed to start runtime: {}", e)))?;
    runtime.block_on(record(args, &runner))
}

async fn record(args: RecordArgs, runner: &CliRunner) -> Result<(), CliError> {
    let overrides = SourceOverrides {
        replay: args.replay,
        nmea_port: args.nmea_port,
    };
    let source = runner.create_source(&overrides)?;
    let source_name = source.name().to_string();
    let context = Arc::new(TrackerContext::with_config(source, runner.tracker_config()));
    // Source errors surface here; the logger restarts the tracker later if
    // the source stops during the session.
    context.tracker()?;

    let store = runner.open_store(args.database.as_deref())?;
    let alerter = TerminalAlerter::new();
    let logger = TrackLogger::new(
        Arc::clone(&context),
        store,
        runner.tracking_settings(),
        alerter.clone(),
    );

    let mut events = logger.events();
    logger.arm(args.name.as_deref()).map_err(CliError::Arm)?;

    // One permit per Ctrl-C
    let interrupts = Arc::new(Notify::new());
    let handler_interrupts = Arc::clone(&interrupts);
    ctrlc::set_handler(move || handler_interrupts.notify_one())
        .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    let tracking = &runner.config().tracking;
    println!("Recording from {} source", source_name);
    println!(
        "  Interval: {} s, minimum distance: {} m",
        tracking.sampling_interval, tracking.minimum_distance
    );
    println!("Press Ctrl-C to stop.");
    println!();

    let outcome = loop {
        tokio::select! {
            _ = interrupts.notified() => break Outcome::Interrupted,
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event, &logger);
                    if let Some(message) = failure_message(&event) {
                        break Outcome::Failed(message);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Progress output fell behind");
                }
                Err(RecvError::Closed) => break Outcome::Interrupted,
            },
        }
    };

    let outcome = match outcome {
        Outcome::Interrupted => {
            println!();
            println!("Stopping...");
            logger.disarm();
            logger.wait_stopped().await;

            // Finalizing can fail too
            let mut outcome = Outcome::Interrupted;
            while let Ok(event) = events.try_recv() {
                print_event(&event, &logger);
                if let Some(message) = failure_message(&event) {
                    outcome = Outcome::Failed(message);
                }
            }
            outcome
        }
        failed => failed,
    };

    let result = match outcome {
        Outcome::Interrupted => Ok(()),
        Outcome::Failed(message) => {
            // The alerter shows the prompt; a second Ctrl-C also ends the wait.
            tokio::select! {
                _ = alerter.confirmed() => {}
                _ = interrupts.notified() => {}
            }
            alerter.stop_alarm();
            Err(CliError::RecordingFailed(message))
        }
    };

    context.shutdown();
    info!("Record command finished");
    result
}

fn failure_message(event: &TrackLogEvent) -> Option<String> {
    match event {
        TrackLogEvent::StorageExhausted { message, .. }
        | TrackLogEvent::WriteFailed { message, .. } => Some(message.clone()),
        _ => None,
    }
}

fn print_event(event: &TrackLogEvent, logger: &TrackLogger) {
    match event {
        TrackLogEvent::Started { session, name } => {
            println!("Session {} started: {}", session, name);
        }
        TrackLogEvent::PointAccepted {
            points,
            distance_meters,
            ..
        } => {
            let position = logger
                .current_track()
                .last()
                .map(|(lon, lat)| format!("{:.6}, {:.6}", lat, lon))
                .unwrap_or_default();
            println!(
                "  #{:<5} {}  {}",
                points,
                position,
                format_distance(*distance_meters)
            );
        }
        TrackLogEvent::Stopped {
            session,
            points,
            kept,
        } => {
            if *kept {
                println!("Session {} saved with {} points", session, points);
            } else {
                println!(
                    "Session {} discarded ({} points, at least 2 needed)",
                    session, points
                );
            }
        }
        TrackLogEvent::StorageExhausted { message, .. } => {
            eprintln!("Storage exhausted: {}", message);
        }
        TrackLogEvent::WriteFailed { message, .. } => {
            eprintln!("Write failed: {}", message);
        }
        TrackLogEvent::WaitInterrupted { .. } => {}
    }
}

/// Format a distance for progress output.
fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.2} km", meters / 1000.0)
    } else {
        format!("{:.0} m", meters)
    }
}
