//! In-memory track store.
//!
//! Keeps sessions in a map and records every call in an operation journal,
//! which makes it convenient for embedding and for asserting call order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::session::{LogPoint, SessionId, SessionSummary};
use super::store::{PersistentTrackStore, StoreError};

/// One call received by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Open(SessionId),
    Append(SessionId),
    SetLength(SessionId),
    Close(SessionId),
    Delete(SessionId),
}

#[derive(Debug, Clone)]
struct StoredSession {
    name: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    length_meters: f64,
    points: Vec<LogPoint>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: SessionId,
    sessions: BTreeMap<SessionId, StoredSession>,
    journal: Vec<StoreOp>,
}

/// Track store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, in order.
    pub fn journal(&self) -> Vec<StoreOp> {
        self.inner.lock().journal.clone()
    }

    /// Points of a session, or `None` if it does not exist.
    pub fn points(&self, session: SessionId) -> Option<Vec<LogPoint>> {
        self.inner
            .lock()
            .sessions
            .get(&session)
            .map(|s| s.points.clone())
    }

    /// Returns true if the session exists.
    pub fn contains(&self, session: SessionId) -> bool {
        self.inner.lock().sessions.contains_key(&session)
    }

    /// Number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }
}

impl PersistentTrackStore for MemoryTrackStore {
    fn open_session(&self, name: &str, created_at: DateTime<Utc>) -> Result<SessionId, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.sessions.insert(
            id,
            StoredSession {
                name: name.to_string(),
                started_at: created_at,
                ended_at: None,
                length_meters: 0.0,
                points: Vec::new(),
            },
        );
        inner.journal.push(StoreOp::Open(id));
        Ok(id)
    }

    fn append_point(&self, session: SessionId, point: &LogPoint) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.journal.push(StoreOp::Append(session));
        let stored = inner
            .sessions
            .get_mut(&session)
            .ok_or(StoreError::SessionNotFound(session))?;
        stored.points.push(*point);
        Ok(())
    }

    fn close_session(&self, session: SessionId, ended_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.journal.push(StoreOp::Close(session));
        let stored = inner
            .sessions
            .get_mut(&session)
            .ok_or(StoreError::SessionNotFound(session))?;
        stored.ended_at = Some(ended_at);
        Ok(())
    }

    fn delete_session(&self, session: SessionId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.journal.push(StoreOp::Delete(session));
        inner
            .sessions
            .remove(&session)
            .map(|_| ())
            .ok_or(StoreError::SessionNotFound(session))
    }

    fn set_session_length(&self, session: SessionId, meters: f64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.journal.push(StoreOp::SetLength(session));
        let stored = inner
            .sessions
            .get_mut(&session)
            .ok_or(StoreError::SessionNotFound(session))?;
        stored.length_meters = meters;
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .sessions
            .iter()
            .map(|(id, s)| SessionSummary {
                id: *id,
                name: s.name.clone(),
                started_at: s.started_at,
                ended_at: s.ended_at,
                length_meters: s.length_meters,
                point_count: s.points.len() as u64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> LogPoint {
        LogPoint::new(11.0, 46.0, 0.0, Utc::now())
    }

    #[test]
    fn test_session_lifecycle() {
        let store = MemoryTrackStore::new();
        let id = store.open_session("trackA", Utc::now()).unwrap();

        store.append_point(id, &point()).unwrap();
        store.append_point(id, &point()).unwrap();
        store.set_session_length(id, 12.5).unwrap();
        store.close_session(id, Utc::now()).unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].name, "trackA");
        assert_eq!(sessions[0].point_count, 2);
        assert_eq!(sessions[0].length_meters, 12.5);
        assert!(sessions[0].is_closed());

        assert_eq!(
            store.journal(),
            vec![
                StoreOp::Open(id),
                StoreOp::Append(id),
                StoreOp::Append(id),
                StoreOp::SetLength(id),
                StoreOp::Close(id),
            ]
        );
    }

    #[test]
    fn test_delete_removes_points() {
        let store = MemoryTrackStore::new();
        let id = store.open_session("trackA", Utc::now()).unwrap();
        store.append_point(id, &point()).unwrap();

        store.delete_session(id).unwrap();
        assert!(!store.contains(id));
        assert!(store.points(id).is_none());
    }

    #[test]
    fn test_unknown_session() {
        let store = MemoryTrackStore::new();
        let result = store.append_point(42, &point());
        assert!(matches!(result, Err(StoreError::SessionNotFound(42))));
    }

    #[test]
    fn test_ids_are_unique() {
        let store = MemoryTrackStore::new();
        let a = store.open_session("a", Utc::now()).unwrap();
        let b = store.open_session("b", Utc::now()).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.session_count(), 2);
    }
}
