//! REST handlers organized by domain. Every session-scoped operation
//! resolves the owning session first; mutations publish their event through
//! the broadcaster after the store write.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use hangar_core::events::HubEvent;
use hangar_core::ids::{NoteId, SessionId, TaskId};
use hangar_store::notes::{Note, NoteDraft, NoteFilter, NotePatch, NoteRepo};
use hangar_store::sessions::{Session, SessionPatch, SessionRepo};
use hangar_store::stt::{SttRepo, TaskDraft, TaskStatus, TaskUpdate, TranscriptionTask};
use hangar_store::telemetry::{Sample, SampleDraft, TelemetryQuery, TelemetryRepo};

use crate::error::ApiError;
use crate::export;
use crate::server::AppState;

// ── Service handlers ──

pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "running",
        "service": "hangar",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

// ── Session handlers ──

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Json<Session> {
    let session = SessionRepo::new(state.store.clone()).create(&req.name, req.description);
    Json(session)
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<Session>> {
    Json(SessionRepo::new(state.store.clone()).list())
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    let session = SessionRepo::new(state.store.clone()).get(&session_id)?;
    Ok(Json(session))
}

pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(patch): Json<SessionPatch>,
) -> Result<Json<Session>, ApiError> {
    let session = SessionRepo::new(state.store.clone()).update(&session_id, patch)?;
    Ok(Json(session))
}

// ── Note handlers ──

pub async fn create_note(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(draft): Json<NoteDraft>,
) -> Result<Json<Note>, ApiError> {
    let note = NoteRepo::new(state.store.clone()).create(&session_id, draft)?;
    state
        .broadcaster
        .publish(&session_id, HubEvent::NoteCreated, &note);
    Ok(Json(note))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Query(filter): Query<NoteFilter>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = NoteRepo::new(state.store.clone()).list(&session_id, &filter)?;
    Ok(Json(notes))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path((session_id, note_id)): Path<(SessionId, NoteId)>,
) -> Result<Json<Note>, ApiError> {
    let note = NoteRepo::new(state.store.clone()).get(&session_id, &note_id)?;
    Ok(Json(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path((session_id, note_id)): Path<(SessionId, NoteId)>,
    Json(patch): Json<NotePatch>,
) -> Result<Json<Note>, ApiError> {
    let note = NoteRepo::new(state.store.clone()).update(&session_id, &note_id, patch)?;
    state
        .broadcaster
        .publish(&session_id, HubEvent::NoteUpdated, &note);
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path((session_id, note_id)): Path<(SessionId, NoteId)>,
) -> Result<Json<Value>, ApiError> {
    NoteRepo::new(state.store.clone()).delete(&session_id, &note_id)?;
    state
        .broadcaster
        .publish(&session_id, HubEvent::NoteDeleted, &json!({ "id": note_id }));
    Ok(Json(json!({ "message": format!("note {note_id} deleted") })))
}

// ── Export handlers ──

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "markdown".to_string()
}

pub async fn export_notes(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let session = SessionRepo::new(state.store.clone()).get(&session_id)?;
    let notes = NoteRepo::new(state.store.clone()).list(&session_id, &NoteFilter::default())?;

    let response = if query.format == "json" {
        let doc = export::render_json(&session, &notes);
        let body = serde_json::to_string_pretty(&doc).unwrap_or_default();
        ([(header::CONTENT_TYPE, "application/json")], body).into_response()
    } else {
        let body = export::render_markdown(&session, &notes);
        ([(header::CONTENT_TYPE, "text/markdown")], body).into_response()
    };
    Ok(response)
}

// ── Telemetry handlers ──

pub async fn create_telemetry(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(draft): Json<SampleDraft>,
) -> Result<Json<Sample>, ApiError> {
    let sample = TelemetryRepo::new(state.store.clone()).create(&session_id, draft)?;
    Ok(Json(sample))
}

#[derive(Debug, Deserialize)]
pub struct TelemetryBatchRequest {
    pub data: Vec<SampleDraft>,
}

pub async fn create_telemetry_batch(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(batch): Json<TelemetryBatchRequest>,
) -> Result<Json<Value>, ApiError> {
    let created = TelemetryRepo::new(state.store.clone()).create_batch(&session_id, batch.data)?;
    Ok(Json(json!({ "created": created })))
}

pub async fn list_telemetry(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Query(query): Query<TelemetryQuery>,
) -> Result<Json<Vec<Sample>>, ApiError> {
    let samples = TelemetryRepo::new(state.store.clone()).query(&session_id, &query)?;
    Ok(Json(samples))
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub channel: String,
}

pub async fn latest_telemetry(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Sample>, ApiError> {
    let sample = TelemetryRepo::new(state.store.clone()).latest(&session_id, &query.channel)?;
    Ok(Json(sample))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Value>, ApiError> {
    let channels = TelemetryRepo::new(state.store.clone()).channels(&session_id)?;
    Ok(Json(json!({ "channels": channels })))
}

// ── STT task handlers ──

pub async fn create_stt_task(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<TranscriptionTask>), ApiError> {
    let task = SttRepo::new(state.store.clone()).create(&session_id, draft)?;
    state
        .broadcaster
        .publish(&session_id, HubEvent::SttTaskCreated, &task);
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_stt_tasks(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Vec<TranscriptionTask>>, ApiError> {
    let tasks = SttRepo::new(state.store.clone()).list(&session_id)?;
    Ok(Json(tasks))
}

pub async fn get_stt_task(
    State(state): State<AppState>,
    Path((session_id, task_id)): Path<(SessionId, TaskId)>,
) -> Result<Json<TranscriptionTask>, ApiError> {
    let task = SttRepo::new(state.store.clone()).get(&session_id, &task_id)?;
    Ok(Json(task))
}

pub async fn update_stt_task(
    State(state): State<AppState>,
    Path((session_id, task_id)): Path<(SessionId, TaskId)>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<TranscriptionTask>, ApiError> {
    let task = SttRepo::new(state.store.clone()).update(&session_id, &task_id, update)?;

    match task.status {
        TaskStatus::Done => {
            state
                .broadcaster
                .publish(&session_id, HubEvent::SttTaskDone, &task);
        }
        TaskStatus::Failed => {
            let message = task.error.as_deref().unwrap_or("transcription failed");
            state.broadcaster.publish_error(&session_id, message, "stt");
        }
        TaskStatus::Pending => {}
    }

    Ok(Json(task))
}
