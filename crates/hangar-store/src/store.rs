use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use hangar_core::ids::{NoteId, SessionId, TaskId};

use crate::error::StoreError;
use crate::notes::Note;
use crate::sessions::Session;
use crate::stt::TranscriptionTask;
use crate::telemetry::Sample;

/// Shared in-memory collections. One lock per collection; no operation
/// holds more than one at a time, so there are no lock-ordering concerns.
pub(crate) struct StoreInner {
    pub(crate) sessions: RwLock<HashMap<SessionId, Session>>,
    pub(crate) notes: RwLock<HashMap<NoteId, Note>>,
    pub(crate) telemetry: RwLock<Vec<Sample>>,
    pub(crate) tasks: RwLock<HashMap<TaskId, TranscriptionTask>>,
}

/// Handle to the process-lifetime record store.
///
/// Volatile: everything is lost on restart. Constructed once at startup and
/// injected into the server; the repositories in this crate are the only
/// way to reach the collections. Cheap to clone.
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                sessions: RwLock::new(HashMap::new()),
                notes: RwLock::new(HashMap::new()),
                telemetry: RwLock::new(Vec::new()),
                tasks: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Whether a session exists. Every session-scoped operation resolves the
    /// owning session before touching its own collection.
    pub fn session_exists(&self, id: &SessionId) -> bool {
        self.inner.sessions.read().contains_key(id)
    }

    pub(crate) fn require_session(&self, id: &SessionId) -> Result<(), StoreError> {
        if self.session_exists(id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("session {id}")))
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_is_empty() {
        let store = Store::new();
        assert!(store.inner.sessions.read().is_empty());
        assert!(store.inner.notes.read().is_empty());
        assert!(store.inner.telemetry.read().is_empty());
        assert!(store.inner.tasks.read().is_empty());
    }

    #[test]
    fn clones_share_state() {
        let store = Store::new();
        let other = store.clone();
        let session = crate::sessions::SessionRepo::new(store).create("Rover Test", None);
        assert!(other.session_exists(&session.id));
    }

    #[test]
    fn unknown_session_fails_requirement() {
        let store = Store::new();
        let missing = hangar_core::ids::SessionId::new();
        assert!(!store.session_exists(&missing));
        assert!(matches!(
            store.require_session(&missing),
            Err(StoreError::NotFound(_))
        ));
    }
}
