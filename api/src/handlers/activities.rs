use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use common::errors::ValidationError;
use common::models::{Activity, ActivityKind};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{ok, ok_with_message, ApiResult, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogActivityRequest {
    pub kind: ActivityKind,
    pub subject: String,
    pub body: Option<String>,
    pub contact_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQueryParams {
    pub contact_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// An activity must hang off a contact or a deal
fn build_activity(
    org_id: Uuid,
    created_by: Uuid,
    req: LogActivityRequest,
    now: DateTime<Utc>,
) -> Result<Activity, ValidationError> {
    if req.subject.trim().is_empty() {
        return Err(ValidationError::MissingField("subject".to_string()));
    }
    if req.contact_id.is_none() && req.deal_id.is_none() {
        return Err(ValidationError::MissingField("contact_id or deal_id".to_string()));
    }

    Ok(Activity {
        id: Uuid::new_v4(),
        org_id,
        kind: req.kind,
        subject: req.subject.trim().to_string(),
        body: req.body.filter(|b| !b.trim().is_empty()),
        contact_id: req.contact_id,
        deal_id: req.deal_id,
        occurred_at: req.occurred_at.unwrap_or(now),
        created_by,
        created_at: now,
    })
}

#[tracing::instrument(skip(state, req))]
pub async fn log_activity(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<LogActivityRequest>,
) -> ApiResult<Activity> {
    let activity = build_activity(scope.org_id, scope.user_id, req, Utc::now())?;
    state.services.repos.activities.create(&activity).await?;
    ok(activity)
}

/// Activities for a contact, a deal, or the most recent for the organization
#[tracing::instrument(skip(state))]
pub async fn list_activities(
    State(state): State<AppState>,
    scope: Scope,
    Query(params): Query<ActivityQueryParams>,
) -> ApiResult<Vec<Activity>> {
    let repo = &state.services.repos.activities;
    let activities = match (params.contact_id, params.deal_id) {
        (Some(contact_id), _) => repo.list_by_contact(scope.org_id, contact_id).await?,
        (None, Some(deal_id)) => repo.list_by_deal(scope.org_id, deal_id).await?,
        (None, None) => {
            repo.list_recent(scope.org_id, params.limit.unwrap_or(50).clamp(1, 200))
                .await?
        }
    };
    ok(activities)
}

#[tracing::instrument(skip(state))]
pub async fn delete_activity(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.repos.activities.delete(scope.org_id, id).await?;
    ok_with_message((), "Activity deleted")
}
