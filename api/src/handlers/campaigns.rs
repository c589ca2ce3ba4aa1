use axum::{
    extract::{Path, State},
    Json,
};
use common::campaigns::{CampaignInput, CategorizeReport};
use common::models::{CampaignStatus, VoiceCampaign};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{ok, ok_with_message, ApiResult, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: CampaignStatus,
}

#[tracing::instrument(skip(state))]
pub async fn list_campaigns(State(state): State<AppState>, scope: Scope) -> ApiResult<Vec<VoiceCampaign>> {
    ok(state.services.campaigns.list(scope.org_id).await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn create_campaign(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<CampaignInput>,
) -> ApiResult<VoiceCampaign> {
    ok(state.services.campaigns.create(scope.org_id, req).await?)
}

#[tracing::instrument(skip(state))]
pub async fn get_campaign(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<VoiceCampaign> {
    ok(state.services.campaigns.get(scope.org_id, id).await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn update_campaign(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<CampaignInput>,
) -> ApiResult<VoiceCampaign> {
    ok(state.services.campaigns.update(scope.org_id, id, req).await?)
}

#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn change_status(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<VoiceCampaign> {
    ok(state
        .services
        .campaigns
        .change_status(scope.org_id, id, req.status)
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn delete_campaign(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.campaigns.delete(scope.org_id, id).await?;
    ok_with_message((), "Campaign deleted")
}

/// Ask the LLM to categorize every uncategorized campaign
#[tracing::instrument(skip(state))]
pub async fn bulk_categorize(State(state): State<AppState>, scope: Scope) -> ApiResult<CategorizeReport> {
    let report = state.services.campaigns.bulk_categorize(scope.org_id).await?;
    let message = format!(
        "Categorized {} of {} campaigns ({} failed)",
        report.categorized, report.processed, report.failed
    );
    ok_with_message(report, message)
}
