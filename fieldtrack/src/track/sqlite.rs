//! SQLite track store.
//!
//! Two tables: `sessions` holds one row per logging session and `points`
//! holds the track points. Times are stored as Unix milliseconds.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use super::session::{LogPoint, SessionId, SessionSummary};
use super::store::{PersistentTrackStore, StoreError};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        started_at INTEGER NOT NULL,
        ended_at INTEGER,
        length_m REAL NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS points (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        longitude REAL NOT NULL,
        latitude REAL NOT NULL,
        altitude REAL NOT NULL,
        ts INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_points_session ON points(session_id);
"#;

/// Track store backed by a SQLite database file.
pub struct SqliteTrackStore {
    conn: Mutex<Connection>,
}

impl SqliteTrackStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Write(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(map_sql_error)?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Opened track database");
        Ok(store)
    }

    /// Create an in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory().map_err(map_sql_error)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sql_error)?;
        conn.execute_batch(SCHEMA).map_err(map_sql_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Points of a session in insertion order.
    pub fn session_points(&self, session: SessionId) -> Result<Vec<LogPoint>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT longitude, latitude, altitude, ts FROM points
                 WHERE session_id = ?1 ORDER BY id",
            )
            .map_err(map_sql_error)?;

        let points = stmt
            .query_map(params![session], |row| {
                Ok(LogPoint::new(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    from_millis(row.get(3)?),
                ))
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;

        Ok(points)
    }
}

impl PersistentTrackStore for SqliteTrackStore {
    fn open_session(&self, name: &str, created_at: DateTime<Utc>) -> Result<SessionId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (name, started_at) VALUES (?1, ?2)",
            params![name, created_at.timestamp_millis()],
        )
        .map_err(map_sql_error)?;

        let id = conn.last_insert_rowid();
        debug!(session_id = id, name, "Session row created");
        Ok(id)
    }

    fn append_point(&self, session: SessionId, point: &LogPoint) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM sessions WHERE id = ?1",
                params![session],
                |_| Ok(()),
            )
            .optional()
            .map_err(map_sql_error)?;
        if exists.is_none() {
            return Err(StoreError::SessionNotFound(session));
        }

        tx.execute(
            "INSERT INTO points (session_id, longitude, latitude, altitude, ts)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session,
                point.longitude,
                point.latitude,
                point.altitude,
                point.timestamp.timestamp_millis()
            ],
        )
        .map_err(map_sql_error)?;

        tx.commit().map_err(map_sql_error)
    }

    fn close_session(&self, session: SessionId, ended_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE sessions SET ended_at = ?2 WHERE id = ?1",
                params![session, ended_at.timestamp_millis()],
            )
            .map_err(map_sql_error)?;

        if updated == 0 {
            return Err(StoreError::SessionNotFound(session));
        }
        Ok(())
    }

    fn delete_session(&self, session: SessionId) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(map_sql_error)?;

        tx.execute("DELETE FROM points WHERE session_id = ?1", params![session])
            .map_err(map_sql_error)?;
        let deleted = tx
            .execute("DELETE FROM sessions WHERE id = ?1", params![session])
            .map_err(map_sql_error)?;
        if deleted == 0 {
            return Err(StoreError::SessionNotFound(session));
        }

        tx.commit().map_err(map_sql_error)
    }

    fn set_session_length(&self, session: SessionId, meters: f64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE sessions SET length_m = ?2 WHERE id = ?1",
                params![session, meters],
            )
            .map_err(map_sql_error)?;

        if updated == 0 {
            return Err(StoreError::SessionNotFound(session));
        }
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.name, s.started_at, s.ended_at, s.length_m,
                        (SELECT COUNT(*) FROM points p WHERE p.session_id = s.id)
                 FROM sessions s ORDER BY s.started_at, s.id",
            )
            .map_err(map_sql_error)?;

        let sessions = stmt
            .query_map([], |row| {
                Ok(SessionSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    started_at: from_millis(row.get(2)?),
                    ended_at: row.get::<_, Option<i64>>(3)?.map(from_millis),
                    length_meters: row.get(4)?,
                    point_count: row.get::<_, i64>(5)? as u64,
                })
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;

        Ok(sessions)
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Map SQLite failures, singling out a full disk.
fn map_sql_error(e: rusqlite::Error) -> StoreError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DiskFull) => StoreError::Exhausted(e.to_string()),
        _ => StoreError::Write(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn point(lon: f64) -> LogPoint {
        LogPoint::new(lon, 46.49, 260.0, Utc::now())
    }

    #[test]
    fn test_append_and_read_back() {
        let store = SqliteTrackStore::in_memory().unwrap();
        let id = store.open_session("trackA", Utc::now()).unwrap();

        store.append_point(id, &point(11.35)).unwrap();
        store.append_point(id, &point(11.36)).unwrap();

        let points = store.session_points(id).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].longitude, 11.35);
        assert_eq!(points[1].longitude, 11.36);
        assert_eq!(points[1].altitude, 260.0);
    }

    #[test]
    fn test_close_sets_end_and_length() {
        let store = SqliteTrackStore::in_memory().unwrap();
        let id = store.open_session("trackA", Utc::now()).unwrap();
        store.append_point(id, &point(11.35)).unwrap();

        store.set_session_length(id, 42.0).unwrap();
        store.close_session(id, Utc::now()).unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_closed());
        assert_eq!(sessions[0].length_meters, 42.0);
        assert_eq!(sessions[0].point_count, 1);
    }

    #[test]
    fn test_delete_removes_session_and_points() {
        let store = SqliteTrackStore::in_memory().unwrap();
        let id = store.open_session("trackA", Utc::now()).unwrap();
        store.append_point(id, &point(11.35)).unwrap();

        store.delete_session(id).unwrap();

        assert!(store.list_sessions().unwrap().is_empty());
        assert!(store.session_points(id).unwrap().is_empty());
        assert!(matches!(
            store.delete_session(id),
            Err(StoreError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_append_to_missing_session() {
        let store = SqliteTrackStore::in_memory().unwrap();
        let result = store.append_point(99, &point(11.35));
        assert!(matches!(result, Err(StoreError::SessionNotFound(99))));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("tracks.db");

        let id = {
            let store = SqliteTrackStore::open(&path).unwrap();
            let id = store.open_session("trackA", Utc::now()).unwrap();
            store.append_point(id, &point(11.35)).unwrap();
            id
        };

        let store = SqliteTrackStore::open(&path).unwrap();
        assert_eq!(store.session_points(id).unwrap().len(), 1);
    }

    #[test]
    fn test_timestamps_round_trip_to_millis() {
        let store = SqliteTrackStore::in_memory().unwrap();
        let started = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        store.open_session("trackA", started).unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions[0].started_at, started);
        assert!(sessions[0].ended_at.is_none());
    }
}
