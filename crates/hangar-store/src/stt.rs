use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use hangar_core::ids::{SessionId, TaskId};

use crate::error::StoreError;
use crate::store::Store;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Tracked unit of work converting an audio chunk to text.
///
/// Born `pending`; transitions exactly once to `done` or `failed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptionTask {
    pub id: TaskId,
    pub session_id: SessionId,
    pub audio_chunk_id: String,
    pub duration_seconds: Option<f64>,
    pub status: TaskStatus,
    pub transcript: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TaskDraft {
    pub audio_chunk_id: String,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

/// Terminal transition for a pending task.
#[derive(Clone, Debug, Deserialize)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct SttRepo {
    store: Store,
}

impl SttRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[instrument(skip(self, draft), fields(session_id = %session_id))]
    pub fn create(
        &self,
        session_id: &SessionId,
        draft: TaskDraft,
    ) -> Result<TranscriptionTask, StoreError> {
        self.store.require_session(session_id)?;

        let now = Utc::now();
        let task = TranscriptionTask {
            id: TaskId::new(),
            session_id: session_id.clone(),
            audio_chunk_id: draft.audio_chunk_id,
            duration_seconds: draft.duration_seconds,
            status: TaskStatus::Pending,
            transcript: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.store
            .inner
            .tasks
            .write()
            .insert(task.id.clone(), task.clone());
        Ok(task)
    }

    /// List a session's tasks, newest created first.
    pub fn list(&self, session_id: &SessionId) -> Result<Vec<TranscriptionTask>, StoreError> {
        self.store.require_session(session_id)?;

        let tasks = self.store.inner.tasks.read();
        let mut matched: Vec<TranscriptionTask> = tasks
            .values()
            .filter(|t| t.session_id == *session_id)
            .cloned()
            .collect();
        drop(tasks);

        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_str().cmp(a.id.as_str()))
        });
        Ok(matched)
    }

    pub fn get(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
    ) -> Result<TranscriptionTask, StoreError> {
        self.store.require_session(session_id)?;
        self.store
            .inner
            .tasks
            .read()
            .get(task_id)
            .filter(|t| t.session_id == *session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("stt task {task_id}")))
    }

    /// Move a pending task to a terminal state. A task that already reached
    /// `done` or `failed` cannot transition again, and the target status
    /// must itself be terminal.
    #[instrument(skip(self, update), fields(session_id = %session_id, task_id = %task_id))]
    pub fn update(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<TranscriptionTask, StoreError> {
        self.store.require_session(session_id)?;

        let mut tasks = self.store.inner.tasks.write();
        let task = tasks
            .get_mut(task_id)
            .filter(|t| t.session_id == *session_id)
            .ok_or_else(|| StoreError::NotFound(format!("stt task {task_id}")))?;

        if task.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "stt task {task_id} already {}",
                task.status
            )));
        }
        if !update.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "stt task {task_id} can only move to a terminal status"
            )));
        }

        task.status = update.status;
        task.transcript = update.transcript;
        task.error = update.error;
        task.updated_at = Utc::now();

        Ok(task.clone())
    }
}
