use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use hangar_store::Store;

use crate::broadcast::Broadcaster;
use crate::handlers;
use crate::subscribers::SubscriberRegistry;
use crate::ws;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            max_send_queue: 256,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: Arc<SubscriberRegistry>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(store: Store, max_send_queue: usize) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(max_send_queue));
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));
        Self {
            store,
            registry,
            broadcaster,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(
            "/api/sessions",
            get(handlers::list_sessions).post(handlers::create_session),
        )
        .route(
            "/api/sessions/{sid}",
            get(handlers::get_session).patch(handlers::update_session),
        )
        .route(
            "/api/sessions/{sid}/notes",
            get(handlers::list_notes).post(handlers::create_note),
        )
        .route(
            "/api/sessions/{sid}/notes/export",
            get(handlers::export_notes),
        )
        .route(
            "/api/sessions/{sid}/notes/{note_id}",
            get(handlers::get_note)
                .put(handlers::update_note)
                .delete(handlers::delete_note),
        )
        .route(
            "/api/sessions/{sid}/telemetry",
            get(handlers::list_telemetry).post(handlers::create_telemetry),
        )
        .route(
            "/api/sessions/{sid}/telemetry/batch",
            axum::routing::post(handlers::create_telemetry_batch),
        )
        .route(
            "/api/sessions/{sid}/telemetry/latest",
            get(handlers::latest_telemetry),
        )
        .route(
            "/api/sessions/{sid}/telemetry/channels",
            get(handlers::list_channels),
        )
        .route(
            "/api/sessions/{sid}/stt/tasks",
            get(handlers::list_stt_tasks).post(handlers::create_stt_task),
        )
        .route(
            "/api/sessions/{sid}/stt/tasks/{task_id}",
            get(handlers::get_stt_task).put(handlers::update_stt_task),
        )
        .route("/ws/sessions/{sid}", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig, store: Store) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(store, config.max_send_queue);
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "hangar server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — dropping it does not stop the server task.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn boot() -> ServerHandle {
        let config = ServerConfig {
            port: 0, // Random port
            ..Default::default()
        };
        start(config, Store::new()).await.unwrap()
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let handle = boot().await;
        assert!(handle.port > 0);

        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn root_reports_service_info() {
        let handle = boot().await;
        let url = format!("http://127.0.0.1:{}/", handle.port);
        let body: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
        assert_eq!(body["service"], "hangar");
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn note_lifecycle_over_http() {
        let handle = boot().await;
        let client = reqwest::Client::new();
        let base = format!("http://127.0.0.1:{}", handle.port);

        // Create a session.
        let session: serde_json::Value = client
            .post(format!("{base}/api/sessions"))
            .json(&json!({ "name": "Rover Test" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let sid = session["id"].as_str().unwrap().to_string();

        // Two notes, inserted out of order.
        client
            .post(format!("{base}/api/sessions/{sid}/notes"))
            .json(&json!({ "timestamp": "2026-03-01T12:00:30Z", "content": "motor stop" }))
            .send()
            .await
            .unwrap();
        let first: serde_json::Value = client
            .post(format!("{base}/api/sessions/{sid}/notes"))
            .json(&json!({ "timestamp": "2026-03-01T12:00:10Z", "content": "motor start" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        // Listed ascending by event timestamp.
        let notes: serde_json::Value = client
            .get(format!("{base}/api/sessions/{sid}/notes"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(notes[0]["content"], "motor start");
        assert_eq!(notes[1]["content"], "motor stop");

        // Partial update refreshes content only.
        let note_id = first["id"].as_str().unwrap();
        let updated: serde_json::Value = client
            .put(format!("{base}/api/sessions/{sid}/notes/{note_id}"))
            .json(&json!({ "content": "motor start confirmed" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(updated["content"], "motor start confirmed");
        assert_eq!(updated["timestamp"], first["timestamp"]);

        // Delete the other note.
        let other_id = notes[1]["id"].as_str().unwrap();
        let resp = client
            .delete(format!("{base}/api/sessions/{sid}/notes/{other_id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let notes: serde_json::Value = client
            .get(format!("{base}/api/sessions/{sid}/notes"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(notes.as_array().unwrap().len(), 1);
        assert_eq!(notes[0]["content"], "motor start confirmed");
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let handle = boot().await;
        let url = format!(
            "http://127.0.0.1:{}/api/sessions/sess_missing/notes",
            handle.port
        );
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 404);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("sess_missing"));
    }

    #[tokio::test]
    async fn terminal_stt_update_is_409() {
        let handle = boot().await;
        let client = reqwest::Client::new();
        let base = format!("http://127.0.0.1:{}", handle.port);

        let session: serde_json::Value = client
            .post(format!("{base}/api/sessions"))
            .json(&json!({ "name": "Rover Test" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let sid = session["id"].as_str().unwrap();

        let task: serde_json::Value = client
            .post(format!("{base}/api/sessions/{sid}/stt/tasks"))
            .json(&json!({ "audio_chunk_id": "chunk-001" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let tid = task["id"].as_str().unwrap();

        let done = json!({ "status": "done", "transcript": "hello world" });
        let resp = client
            .put(format!("{base}/api/sessions/{sid}/stt/tasks/{tid}"))
            .json(&done)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .put(format!("{base}/api/sessions/{sid}/stt/tasks/{tid}"))
            .json(&done)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
    }

    #[tokio::test]
    async fn export_markdown_over_http() {
        let handle = boot().await;
        let client = reqwest::Client::new();
        let base = format!("http://127.0.0.1:{}", handle.port);

        let session: serde_json::Value = client
            .post(format!("{base}/api/sessions"))
            .json(&json!({ "name": "Rover Test" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let sid = session["id"].as_str().unwrap();

        client
            .post(format!("{base}/api/sessions/{sid}/notes"))
            .json(&json!({
                "timestamp": "2026-03-01T12:00:10Z",
                "content": "motor start",
                "tags": ["power"],
            }))
            .send()
            .await
            .unwrap();

        let resp = client
            .get(format!("{base}/api/sessions/{sid}/notes/export"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/markdown"));

        let body = resp.text().await.unwrap();
        assert!(body.starts_with("# Rover Test"));
        assert!(body.contains("motor start"));
    }

    #[test]
    fn build_router_creates_routes() {
        let state = AppState::new(Store::new(), 32);
        let _router = build_router(state);
        // If this doesn't panic, the router was built successfully
    }
}
