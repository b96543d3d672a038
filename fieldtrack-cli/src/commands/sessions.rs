//! Sessions command - list recorded sessions or dump one session's points.

use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};

use fieldtrack::config::ConfigFile;
use fieldtrack::track::{PersistentTrackStore, SessionId, SessionSummary, SqliteTrackStore};

use crate::error::CliError;

/// Arguments for the sessions command.
pub struct SessionsArgs {
    pub database: Option<PathBuf>,
    /// Print the points of this session instead of the list.
    pub points: Option<SessionId>,
}

/// Run the sessions command.
pub fn run(args: SessionsArgs, config: &ConfigFile) -> Result<(), CliError> {
    let path = args
        .database
        .unwrap_or_else(|| config.storage.database.clone());

    if !path.exists() {
        println!("No track database at {}", path.display());
        return Ok(());
    }

    let store = SqliteTrackStore::open(&path)?;

    match args.points {
        Some(session) => print_points(&store, session),
        None => print_sessions(&store.list_sessions()?, &path),
    }
}

fn print_sessions(sessions: &[SessionSummary], path: &std::path::Path) -> Result<(), CliError> {
    println!("Track database: {}", path.display());
    println!();

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<24}  {:<19}  {:>9}  {:>7}  {:>10}",
        "ID", "NAME", "STARTED", "DURATION", "POINTS", "LENGTH"
    );
    for session in sessions {
        println!("{}", format_row(session));
    }
    println!();
    println!("{} session(s)", sessions.len());

    Ok(())
}

fn print_points(store: &SqliteTrackStore, session: SessionId) -> Result<(), CliError> {
    let points = store.session_points(session)?;
    println!("# session {}, {} point(s)", session, points.len());
    println!("time,longitude,latitude,altitude");
    for point in points {
        println!(
            "{},{:.7},{:.7},{:.1}",
            point.timestamp.to_rfc3339(),
            point.longitude,
            point.latitude,
            point.altitude
        );
    }
    Ok(())
}

fn format_row(session: &SessionSummary) -> String {
    let duration = session
        .ended_at
        .map(|end| format_duration(session.started_at, end))
        .unwrap_or_else(|| "open".to_string());

    format!(
        "{:>5}  {:<24}  {:<19}  {:>9}  {:>7}  {:>8.0} m",
        session.id,
        truncate(&session.name, 24),
        session
            .started_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S"),
        duration,
        session.point_count,
        session.length_meters
    )
}

fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let secs = (end - start).num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max - 1).collect();
    shortened.push('…');
    shortened
}
