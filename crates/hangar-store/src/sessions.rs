use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use hangar_core::ids::SessionId;

use crate::error::StoreError;
use crate::store::Store;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// A bounded test run that scopes all notes, telemetry, and tasks.
///
/// Invariant: `ended_at` is `Some` iff `status` is `Ended`, and once set it
/// is never cleared.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub description: Option<String>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Fields accepted on update. Absent fields are left unchanged; there is no
/// way to clear a field through a patch.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<SessionStatus>,
}

pub struct SessionRepo {
    store: Store,
}

impl SessionRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a new session. Cannot fail: ids are freshly allocated.
    #[instrument(skip(self, description))]
    pub fn create(&self, name: &str, description: Option<String>) -> Session {
        let session = Session {
            id: SessionId::new(),
            name: name.to_string(),
            description,
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
        };
        self.store
            .inner
            .sessions
            .write()
            .insert(session.id.clone(), session.clone());
        session
    }

    pub fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.store
            .inner
            .sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))
    }

    /// List all sessions, newest start time first.
    pub fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> =
            self.store.inner.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        sessions
    }

    /// Apply a partial update. Ending stamps `ended_at` once; ending an
    /// already-ended session keeps the original stamp, and reactivating an
    /// ended session is rejected so `ended_at` can never contradict status.
    #[instrument(skip(self, patch), fields(session_id = %id))]
    pub fn update(&self, id: &SessionId, patch: SessionPatch) -> Result<Session, StoreError> {
        let mut sessions = self.store.inner.sessions.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("session {id}")))?;

        if let Some(status) = patch.status {
            match (session.status, status) {
                (SessionStatus::Ended, SessionStatus::Active) => {
                    return Err(StoreError::Conflict(format!("session {id} already ended")));
                }
                (SessionStatus::Active, SessionStatus::Ended) => {
                    session.status = SessionStatus::Ended;
                    session.ended_at = Some(Utc::now());
                }
                _ => {}
            }
        }
        if let Some(name) = patch.name {
            session.name = name;
        }
        if let Some(description) = patch.description {
            session.description = Some(description);
        }

        Ok(session.clone())
    }
}
