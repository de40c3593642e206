//! In-memory session store
//!
//! Owned by the driver loop and mutated only from there, so it needs no
//! locking. Sessions live for the lifetime of the process.

use std::collections::HashMap;

use sdk::types::{Session, SessionId};

/// Session id to session mapping
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a session out of the store, creating an empty one for unseen ids
    ///
    /// The store no longer holds the session until it is handed back with
    /// `insert`.
    pub fn checkout(&mut self, id: &SessionId) -> Session {
        self.sessions.remove(id).unwrap_or_else(|| {
            tracing::debug!("Creating session {}", id);
            Session::new(id.clone())
        })
    }

    /// Store a session under its own id, replacing any previous state
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id().clone(), session);
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
