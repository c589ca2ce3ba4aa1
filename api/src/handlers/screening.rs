use axum::{
    extract::{Path, State},
    Json,
};
use common::db::repositories::ScreenerSender;
use common::models::{ScreeningBucket, ScreeningDecision};
use serde::{Deserialize, Serialize};

use crate::handlers::{ok, ApiResult, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub sender: String,
    pub bucket: ScreeningBucket,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub decision: ScreeningDecision,
    pub messages_moved: u64,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub messages_moved: u64,
}

/// Senders waiting in the Screener
#[tracing::instrument(skip(state))]
pub async fn screener_queue(
    State(state): State<AppState>,
    scope: Scope,
) -> ApiResult<Vec<ScreenerSender>> {
    ok(state
        .services
        .screening
        .screener_queue(scope.org_id, scope.user_id)
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn list_decisions(
    State(state): State<AppState>,
    scope: Scope,
) -> ApiResult<Vec<ScreeningDecision>> {
    ok(state
        .services
        .screening
        .list_decisions(scope.org_id, scope.user_id)
        .await?)
}

/// File a sender into a bucket and move their existing mail
#[tracing::instrument(skip(state, req), fields(bucket = %req.bucket))]
pub async fn record_decision(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<DecisionResponse> {
    let (decision, messages_moved) = state
        .services
        .screening
        .record_decision(scope.org_id, scope.user_id, &req.sender, req.bucket)
        .await?;
    ok(DecisionResponse {
        decision,
        messages_moved,
    })
}

#[tracing::instrument(skip(state))]
pub async fn clear_decision(
    State(state): State<AppState>,
    scope: Scope,
    Path(sender): Path<String>,
) -> ApiResult<ClearedResponse> {
    let messages_moved = state
        .services
        .screening
        .clear_decision(scope.user_id, &sender)
        .await?;
    ok(ClearedResponse { messages_moved })
}
