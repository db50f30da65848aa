//! Per-user conversation sessions.
//!
//! A [`Session`] holds the selected repository and its chat history.
//! Sessions are passed explicitly to the workflow; the
//! [`SessionStore`] keeps them addressable by id for long-lived hosts.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::models::ConversationTurn;
use crate::repo::RepoRef;
use crate::store::CollectionHandle;

/// One user's working state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub repo: Option<RepoRef>,
    pub collection: Option<String>,
    pub history: Vec<ConversationTurn>,
    /// Set once this session has ingested its repository.
    pub processed: bool,
    pub last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            repo: None,
            collection: None,
            history: Vec::new(),
            processed: false,
            last_error: None,
        }
    }

    /// Point the session at `repo` without ingesting it. Clears history.
    pub fn attach(&mut self, repo: RepoRef) {
        self.collection = Some(repo.collection_name());
        self.repo = Some(repo);
        self.history.clear();
        self.processed = false;
        self.last_error = None;
    }

    /// Forget the conversation but stay on the same repository.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.last_error = None;
    }

    /// Return to the initial, empty state, keeping the id.
    pub fn reset(&mut self) {
        *self = Self::with_id(self.id);
    }

    /// Repository and collection, or a validation error if none is attached.
    pub fn target(&self) -> Result<(RepoRef, CollectionHandle)> {
        match (&self.repo, &self.collection) {
            (Some(repo), Some(coll)) => Ok((repo.clone(), CollectionHandle::new(coll.clone()))),
            _ => Err(RagError::Validation(
                "no repository selected for this session".to_string(),
            )),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> RagError {
    RagError::Store("session store lock poisoned".to_string())
}

/// Thread-safe registry of sessions keyed by id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh session and return its id.
    pub fn create(&self) -> Result<Uuid> {
        let session = Session::new();
        let id = session.id;
        self.sessions.write().map_err(poisoned)?.insert(id, session);
        Ok(id)
    }

    /// Snapshot of a session.
    pub fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.read().map_err(poisoned)?.get(&id).cloned())
    }

    /// Store `session` under its own id, replacing any previous state.
    pub fn put(&self, session: Session) -> Result<()> {
        self.sessions
            .write()
            .map_err(poisoned)?
            .insert(session.id, session);
        Ok(())
    }

    /// Reset a session in place. Returns false if the id is unknown.
    pub fn reset(&self, id: Uuid) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        match sessions.get_mut(&id) {
            Some(s) => {
                s.reset();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.write().map_err(poisoned)?.remove(&id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.sessions.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Apply `f` to a stored session and return its result.
    ///
    /// Fails with a validation error if `id` is unknown.
    pub fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> T) -> Result<T> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| RagError::Validation(format!("unknown session {}", id)))?;
        Ok(f(session))
    }
}
