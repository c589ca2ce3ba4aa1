use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use common::models::{Notification, Reminder};
use common::reminders::NewReminder;
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{ok, ok_with_message, ApiResult, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpcomingParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    #[serde(default)]
    pub unread_only: bool,
}

#[tracing::instrument(skip(state, req))]
pub async fn create_reminder(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<NewReminder>,
) -> ApiResult<Reminder> {
    ok(state
        .services
        .reminders
        .create(scope.org_id, scope.user_id, req)
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn list_upcoming(
    State(state): State<AppState>,
    scope: Scope,
    Query(params): Query<UpcomingParams>,
) -> ApiResult<Vec<Reminder>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    ok(state
        .services
        .reminders
        .list_upcoming(scope.org_id, scope.user_id, limit)
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn cancel_reminder(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .reminders
        .cancel(scope.org_id, scope.user_id, id)
        .await?;
    ok_with_message((), "Reminder cancelled")
}

#[tracing::instrument(skip(state, req))]
pub async fn snooze_reminder(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<SnoozeRequest>,
) -> ApiResult<()> {
    state
        .services
        .reminders
        .snooze(scope.org_id, scope.user_id, id, req.due_at)
        .await?;
    ok_with_message((), "Reminder snoozed")
}

#[tracing::instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    scope: Scope,
    Query(params): Query<NotificationParams>,
) -> ApiResult<Vec<Notification>> {
    ok(state
        .services
        .reminders
        .notifications(scope.org_id, scope.user_id, params.unread_only)
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .reminders
        .mark_notification_read(scope.org_id, scope.user_id, id)
        .await?;
    ok(())
}
