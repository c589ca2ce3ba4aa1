use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use common::crm::{compute_sales_metrics, stage_transition, SalesMetrics};
use common::errors::ValidationError;
use common::models::{Deal, DealStage};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{not_found, ok, ok_with_message, ApiResult, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DealRequest {
    pub title: String,
    #[serde(default)]
    pub value: f64,
    pub currency: Option<String>,
    pub stage: Option<DealStage>,
    pub contact_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub expected_close_date: Option<NaiveDate>,
    pub lost_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveStageRequest {
    pub stage: DealStage,
    pub lost_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DealQueryParams {
    pub stage: Option<DealStage>,
}

fn validate_deal(req: &DealRequest) -> Result<String, ValidationError> {
    if req.title.trim().is_empty() {
        return Err(ValidationError::MissingField("title".to_string()));
    }
    if !req.value.is_finite() || req.value < 0.0 {
        return Err(ValidationError::invalid("value", "must be a non-negative amount"));
    }
    let currency = req
        .currency
        .as_deref()
        .map(|c| c.trim().to_ascii_uppercase())
        .unwrap_or_else(|| "USD".to_string());
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid("currency", "must be a 3-letter ISO code"));
    }
    Ok(currency)
}

#[tracing::instrument(skip(state))]
pub async fn list_deals(
    State(state): State<AppState>,
    scope: Scope,
    Query(params): Query<DealQueryParams>,
) -> ApiResult<Vec<Deal>> {
    ok(state.services.repos.deals.list(scope.org_id, params.stage).await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn create_deal(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<DealRequest>,
) -> ApiResult<Deal> {
    let currency = validate_deal(&req)?;
    let now = Utc::now();
    let stage = req.stage.unwrap_or(DealStage::Lead);
    let (closed_at, lost_reason) = stage_transition(stage, None, req.lost_reason.clone(), now)?;

    let deal = Deal {
        id: Uuid::new_v4(),
        org_id: scope.org_id,
        title: req.title.trim().to_string(),
        value: req.value,
        currency,
        stage,
        contact_id: req.contact_id,
        owner_id: req.owner_id.or(Some(scope.user_id)),
        expected_close_date: req.expected_close_date,
        closed_at,
        lost_reason,
        created_at: now,
        updated_at: now,
    };

    state.services.repos.deals.create(&deal).await?;
    ok(deal)
}

#[tracing::instrument(skip(state))]
pub async fn get_deal(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<Deal> {
    let deal = state
        .services
        .repos
        .deals
        .find_by_id(scope.org_id, id)
        .await?
        .ok_or_else(|| not_found("Deal"))?;
    ok(deal)
}

/// Update deal details; the stage moves through `move_stage`
#[tracing::instrument(skip(state, req))]
pub async fn update_deal(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<DealRequest>,
) -> ApiResult<Deal> {
    let currency = validate_deal(&req)?;
    let mut deal = state
        .services
        .repos
        .deals
        .find_by_id(scope.org_id, id)
        .await?
        .ok_or_else(|| not_found("Deal"))?;

    deal.title = req.title.trim().to_string();
    deal.value = req.value;
    deal.currency = currency;
    deal.contact_id = req.contact_id;
    deal.owner_id = req.owner_id.or(deal.owner_id);
    deal.expected_close_date = req.expected_close_date;
    deal.updated_at = Utc::now();

    state.services.repos.deals.update(&deal).await?;
    ok(deal)
}

#[tracing::instrument(skip(state, req), fields(stage = %req.stage))]
pub async fn move_stage(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveStageRequest>,
) -> ApiResult<Deal> {
    let mut deal = state
        .services
        .repos
        .deals
        .find_by_id(scope.org_id, id)
        .await?
        .ok_or_else(|| not_found("Deal"))?;

    let now = Utc::now();
    let current_closed_at = if deal.stage.is_closed() { deal.closed_at } else { None };
    let (closed_at, lost_reason) = stage_transition(req.stage, current_closed_at, req.lost_reason, now)?;

    state
        .services
        .repos
        .deals
        .update_stage(scope.org_id, id, req.stage, closed_at, lost_reason.as_deref())
        .await?;

    deal.stage = req.stage;
    deal.closed_at = closed_at;
    deal.lost_reason = lost_reason;
    deal.updated_at = now;
    ok(deal)
}

#[tracing::instrument(skip(state))]
pub async fn delete_deal(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.repos.deals.delete(scope.org_id, id).await?;
    ok_with_message((), "Deal deleted")
}

/// Pipeline analytics over every deal of the organization
#[tracing::instrument(skip(state))]
pub async fn sales_metrics(State(state): State<AppState>, scope: Scope) -> ApiResult<SalesMetrics> {
    let deals = state.services.repos.deals.list(scope.org_id, None).await?;
    ok(compute_sales_metrics(&deals, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: &str, value: f64, currency: Option<&str>) -> DealRequest {
        DealRequest {
            title: title.to_string(),
            value,
            currency: currency.map(str::to_string),
            stage: None,
            contact_id: None,
            owner_id: None,
            expected_close_date: None,
            lost_reason: None,
        }
    }

    #[test]
    fn test_currency_defaults_and_normalizes() {
        assert_eq!(validate_deal(&request("Renewal", 10.0, None)).unwrap(), "USD");
        assert_eq!(validate_deal(&request("Renewal", 10.0, Some("eur"))).unwrap(), "EUR");
    }

    #[test]
    fn test_rejects_bad_deals() {
        assert!(validate_deal(&request(" ", 10.0, None)).is_err());
        assert!(validate_deal(&request("Renewal", -1.0, None)).is_err());
        assert!(validate_deal(&request("Renewal", f64::NAN, None)).is_err());
        assert!(validate_deal(&request("Renewal", 1.0, Some("EURO"))).is_err());
    }
}
