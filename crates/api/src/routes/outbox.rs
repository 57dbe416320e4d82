//! Scheduler-triggered worker routes.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use draftbell_common::error::AppError;
use draftbell_outbox::worker::BatchSummary;

use crate::middleware::auth::ServiceAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/outbox/process", post(process_outbox))
        .route("/api/outbox/recover", post(recover_outbox))
}

/// POST /api/outbox/process — Run one claim-and-dispatch invocation.
async fn process_outbox(
    State(state): State<AppState>,
    _service: ServiceAuth,
) -> Result<Json<BatchSummary>, AppError> {
    let summary = state.worker.run_once().await?;
    Ok(Json(summary))
}

/// POST /api/outbox/recover — Reset records stuck in `processing`.
async fn recover_outbox(
    State(state): State<AppState>,
    _service: ServiceAuth,
) -> Result<Json<serde_json::Value>, AppError> {
    let reclaimed = state.worker.reclaim_stale(Utc::now()).await?;
    Ok(Json(json!({ "reclaimed": reclaimed })))
}
