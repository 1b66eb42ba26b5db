use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use hangar_core::ids::{NoteId, SessionId};
use hangar_core::time::{utc_flexible, utc_flexible_opt};

use crate::error::StoreError;
use crate::store::Store;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    #[default]
    Observation,
    Command,
    System,
}

impl std::fmt::Display for NoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observation => write!(f, "observation"),
            Self::Command => write!(f, "command"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A timestamped annotation owned by one session.
///
/// `timestamp` is the moment the annotated event occurred, supplied by the
/// caller; `created_at`/`updated_at` are stamped by the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub session_id: SessionId,
    #[serde(with = "utc_flexible")]
    pub timestamp: DateTime<Utc>,
    pub speaker: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub tags: Vec<String>,
    pub telemetry_snapshot: Option<serde_json::Map<String, serde_json::Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a note.
#[derive(Clone, Debug, Deserialize)]
pub struct NoteDraft {
    #[serde(with = "utc_flexible")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub speaker: Option<String>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub telemetry_snapshot: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Fields accepted on update. Absent fields are left unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NotePatch {
    pub content: Option<String>,
    pub speaker: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NoteKind>,
    pub tags: Option<Vec<String>>,
}

/// Conjunctive filters for listing notes. Time bounds are inclusive.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NoteFilter {
    pub speaker: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NoteKind>,
    #[serde(default, with = "utc_flexible_opt")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, with = "utc_flexible_opt")]
    pub to: Option<DateTime<Utc>>,
}

pub struct NoteRepo {
    store: Store,
}

impl NoteRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, draft), fields(session_id = %session_id))]
    pub fn create(&self, session_id: &SessionId, draft: NoteDraft) -> Result<Note, StoreError> {
        self.store.require_session(session_id)?;

        let now = Utc::now();
        let note = Note {
            id: NoteId::new(),
            session_id: session_id.clone(),
            timestamp: draft.timestamp,
            speaker: draft.speaker,
            content: draft.content,
            kind: draft.kind,
            tags: draft.tags,
            telemetry_snapshot: draft.telemetry_snapshot,
            created_at: now,
            updated_at: now,
        };
        self.store
            .inner
            .notes
            .write()
            .insert(note.id.clone(), note.clone());
        Ok(note)
    }

    /// List a session's notes ascending by event timestamp, ties broken by
    /// creation order.
    pub fn list(
        &self,
        session_id: &SessionId,
        filter: &NoteFilter,
    ) -> Result<Vec<Note>, StoreError> {
        self.store.require_session(session_id)?;

        let notes = self.store.inner.notes.read();
        let mut matched: Vec<Note> = notes
            .values()
            .filter(|n| n.session_id == *session_id)
            .filter(|n| {
                filter
                    .speaker
                    .as_ref()
                    .map_or(true, |s| n.speaker.as_deref() == Some(s.as_str()))
            })
            .filter(|n| filter.kind.map_or(true, |k| n.kind == k))
            .filter(|n| filter.from.map_or(true, |from| n.timestamp >= from))
            .filter(|n| filter.to.map_or(true, |to| n.timestamp <= to))
            .cloned()
            .collect();
        drop(notes);

        matched.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(matched)
    }

    pub fn get(&self, session_id: &SessionId, note_id: &NoteId) -> Result<Note, StoreError> {
        self.store.require_session(session_id)?;
        self.store
            .inner
            .notes
            .read()
            .get(note_id)
            .filter(|n| n.session_id == *session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("note {note_id}")))
    }

    /// Apply a partial update; `updated_at` is always refreshed.
    #[instrument(skip(self, patch), fields(session_id = %session_id, note_id = %note_id))]
    pub fn update(
        &self,
        session_id: &SessionId,
        note_id: &NoteId,
        patch: NotePatch,
    ) -> Result<Note, StoreError> {
        self.store.require_session(session_id)?;

        let mut notes = self.store.inner.notes.write();
        let note = notes
            .get_mut(note_id)
            .filter(|n| n.session_id == *session_id)
            .ok_or_else(|| StoreError::NotFound(format!("note {note_id}")))?;

        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(speaker) = patch.speaker {
            note.speaker = Some(speaker);
        }
        if let Some(kind) = patch.kind {
            note.kind = kind;
        }
        if let Some(tags) = patch.tags {
            note.tags = tags;
        }
        note.updated_at = Utc::now();

        Ok(note.clone())
    }

    #[instrument(skip(self), fields(session_id = %session_id, note_id = %note_id))]
    pub fn delete(&self, session_id: &SessionId, note_id: &NoteId) -> Result<(), StoreError> {
        self.store.require_session(session_id)?;

        let mut notes = self.store.inner.notes.write();
        let belongs = notes
            .get(note_id)
            .map_or(false, |n| n.session_id == *session_id);
        if !belongs {
            return Err(StoreError::NotFound(format!("note {note_id}")));
        }
        notes.remove(note_id);
        Ok(())
    }
}
