use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Events fanned out to a session's live subscribers.
///
/// This is a closed set: the broadcaster never inspects the variant, so
/// adding one requires no change to its delivery logic. `Connected` is the
/// handshake sent to a single new connection and is never broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubEvent {
    #[serde(rename = "connected")]
    Connected,

    #[serde(rename = "note.created")]
    NoteCreated,

    #[serde(rename = "note.updated")]
    NoteUpdated,

    #[serde(rename = "note.deleted")]
    NoteDeleted,

    #[serde(rename = "stt.task.created")]
    SttTaskCreated,

    #[serde(rename = "stt.task.done")]
    SttTaskDone,

    #[serde(rename = "transcript.chunk.ready")]
    TranscriptChunkReady,

    /// Carries `{message, source}`; emitted when a task transitions to failed.
    #[serde(rename = "error.occurred")]
    ErrorOccurred,
}

impl HubEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::NoteCreated => "note.created",
            Self::NoteUpdated => "note.updated",
            Self::NoteDeleted => "note.deleted",
            Self::SttTaskCreated => "stt.task.created",
            Self::SttTaskDone => "stt.task.done",
            Self::TranscriptChunkReady => "transcript.chunk.ready",
            Self::ErrorOccurred => "error.occurred",
        }
    }
}

impl std::fmt::Display for HubEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire envelope delivered to every subscriber of a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub event: HubEvent,
    pub session_id: SessionId,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new(event: HubEvent, session_id: SessionId, data: serde_json::Value) -> Self {
        Self {
            event,
            session_id,
            data,
        }
    }
}
