//! Provider delivery webhooks.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use draftbell_common::error::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/telnyx", post(telnyx_webhook))
}

/// POST /webhooks/telnyx — Telnyx messaging events.
///
/// Unknown events and unknown message ids are acknowledged with 200 so the
/// provider does not redeliver them.
async fn telnyx_webhook(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let outcome = state.webhooks.handle_telnyx(&body).await?;
    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
