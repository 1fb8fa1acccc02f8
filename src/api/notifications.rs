//! Notification endpoints for the vehicle CRUD collaborators.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::notification::{Notification, NotificationKind};
use crate::server::AppState;

const MAX_MESSAGE_LEN: usize = 2000;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    pub kind: NotificationKind,
    /// Related entity, e.g. a vehicle id
    pub subject_ref: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UnreadQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub total: usize,
}

/// POST /api/v1/notifications - Record a notification
#[tracing::instrument(
    name = "http.create_notification",
    skip(state, request),
    fields(kind = %request.kind)
)]
pub async fn create_notification(
    State(state): State<AppState>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>)> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message is required".to_string()));
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "message exceeds {} bytes",
            MAX_MESSAGE_LEN
        )));
    }

    let subject_ref = request
        .subject_ref
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let notification = state
        .store
        .create(request.kind, subject_ref, message.to_string())
        .await?;

    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /api/v1/notifications/unread - Pending notifications, oldest first
#[tracing::instrument(name = "http.list_unread", skip(state))]
pub async fn list_unread(
    State(state): State<AppState>,
    Query(query): Query<UnreadQuery>,
) -> Result<Json<NotificationListResponse>> {
    let limit = query.limit.map(|l| l.min(MAX_LIST_LIMIT));
    let notifications = state.store.list_unread(limit).await?;
    let total = notifications.len();

    Ok(Json(NotificationListResponse {
        notifications,
        total,
    }))
}

/// GET /api/v1/notifications/{id}
#[tracing::instrument(name = "http.get_notification", skip(state))]
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    Ok(Json(state.store.get(&id).await?))
}

/// POST /api/v1/notifications/{id}/read - Idempotent mark-read
#[tracing::instrument(name = "http.mark_read", skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    Ok(Json(state.store.mark_read(&id).await?))
}
