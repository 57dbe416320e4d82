//! Notification enqueue and lookup routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::{AuditEvent, Channel, NotificationRecord};
use draftbell_outbox::enqueue::{EnqueueRequest, EnqueueResult};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(enqueue_notification))
        .route("/api/notifications/{id}", get(get_notification))
}

/// Enqueue request body. `channel` stays a string so an unknown value is a
/// 400 with a useful message rather than a generic deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueBody {
    pub channel: Option<String>,
    pub destination: Option<String>,
    pub user_id: Option<Uuid>,
    pub league_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub template_key: Option<String>,
    pub message_text: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl TryFrom<EnqueueBody> for EnqueueRequest {
    type Error = AppError;

    fn try_from(body: EnqueueBody) -> Result<Self, Self::Error> {
        let channel = body
            .channel
            .as_deref()
            .map(str::parse::<Channel>)
            .transpose()
            .map_err(AppError::InvalidRequest)?;

        Ok(EnqueueRequest {
            channel,
            destination: body.destination,
            user_id: body.user_id,
            league_id: body.league_id,
            team_id: body.team_id,
            template_key: body.template_key,
            message_text: body.message_text,
            payload: body.payload,
        })
    }
}

/// POST /api/notifications — Enqueue a notification.
///
/// Blocked outcomes are a 200 with `accepted: false`.
async fn enqueue_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<EnqueueBody>, JsonRejection>,
) -> Result<Json<EnqueueResult>, AppError> {
    let Json(body) = body.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let request = EnqueueRequest::try_from(body)?;

    let result = state.enqueue.enqueue(request, Some(auth.user_id)).await?;

    if result.accepted
        && let Some(wake) = &state.wake
    {
        wake.notify().await;
    }

    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct NotificationDetail {
    pub notification: NotificationRecord,
    pub audit: Vec<AuditEvent>,
}

/// GET /api/notifications/:id — A notification addressed to the caller, with its history.
async fn get_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationDetail>, AppError> {
    let notification = state
        .store
        .get(id)
        .await?
        .filter(|n| n.user_id == Some(auth.user_id))
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;

    let audit = state.store.audit_for(id).await?;

    Ok(Json(NotificationDetail {
        notification,
        audit,
    }))
}
