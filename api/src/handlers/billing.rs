use axum::{
    extract::{Path, Query, State},
    Json,
};
use common::billing::{UsageCheck, UsageSummary};
use common::models::{PlanTier, UsageMetric};
use serde::Deserialize;

use crate::handlers::{ok, ok_with_message, ApiResult, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckParams {
    #[serde(default)]
    pub additional: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: PlanTier,
}

/// Usage of every metric for the current period
#[tracing::instrument(skip(state))]
pub async fn usage_summary(State(state): State<AppState>, scope: Scope) -> ApiResult<UsageSummary> {
    ok(state.services.billing.usage_summary(scope.org_id).await?)
}

#[tracing::instrument(skip(state))]
pub async fn check_usage(
    State(state): State<AppState>,
    scope: Scope,
    Path(metric): Path<UsageMetric>,
    Query(params): Query<CheckParams>,
) -> ApiResult<UsageCheck> {
    ok(state
        .services
        .billing
        .check_usage(scope.org_id, metric, params.additional.max(0))
        .await?)
}

#[tracing::instrument(skip(state, req), fields(plan = %req.plan))]
pub async fn change_plan(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<ChangePlanRequest>,
) -> ApiResult<UsageSummary> {
    state.services.billing.change_plan(scope.org_id, req.plan).await?;
    let summary = state.services.billing.usage_summary(scope.org_id).await?;
    ok_with_message(summary, format!("Plan changed to {}", req.plan))
}
