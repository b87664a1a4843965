use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::errors::{SessionError, SessionResult};
use crate::session::Session;
use crate::types::{EndpointId, SessionId};

/// Registry of live sessions, keyed by session id
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: DashMap<SessionId, Session>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. At most one live session may exist per id.
    pub fn insert(&self, session: Session) -> SessionResult<()> {
        match self.sessions.entry(session.id().clone()) {
            Entry::Occupied(_) => Err(SessionError::DuplicateSession(session.id().to_string())),
            Entry::Vacant(slot) => {
                debug!(session = %session.id(), "registered session");
                slot.insert(session);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &SessionId) -> Option<Session> {
        let removed = self.sessions.remove(id).map(|(_, session)| session);
        if removed.is_some() {
            debug!(session = %id, "removed session");
        }
        removed
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Sessions with the given remote endpoint
    pub fn by_endpoint(&self, endpoint: &EndpointId) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().remote_endpoint() == endpoint)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn all(&self) -> Vec<Session> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
