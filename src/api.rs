// src/api.rs
//! Trigger surface. Every handler only enqueues work and answers with a
//! status object; the pipeline itself runs behind the dispatcher.

use std::path::PathBuf;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::queue::{Job, JobQueue};

#[derive(Clone)]
pub struct AppState {
    queue: JobQueue,
    opml_path: PathBuf,
}

pub fn create_router(queue: JobQueue, opml_path: PathBuf) -> Router {
    let state = AppState { queue, opml_path };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ingest/run", post(ingest_run))
        .route("/scoring/run", post(scoring_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct StatusResp {
    status: &'static str,
}

/// Kicks off one feed fan-out. A non-empty body is taken as an OPML
/// document; an empty body means "use the configured file".
async fn ingest_run(State(state): State<AppState>, body: String) -> Response {
    let opml = if body.trim().is_empty() {
        match tokio::fs::read_to_string(&state.opml_path).await {
            Ok(content) => content,
            Err(err) => {
                let detail = format!("reading {}: {}", state.opml_path.display(), err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "status": "error", "detail": detail })),
                )
                    .into_response();
            }
        }
    } else {
        body
    };

    info!(target: "api", bytes = opml.len(), "ingest run requested");
    state.queue.enqueue(Job::DownloadFeeds { opml });
    Json(StatusResp { status: "started" }).into_response()
}

/// Re-enqueues every unscored article via a recovery scan.
async fn scoring_run(State(state): State<AppState>) -> Json<StatusResp> {
    info!(target: "api", "scoring run requested");
    state.queue.enqueue(Job::RecoveryScan);
    Json(StatusResp {
        status: "queries_started",
    })
}
