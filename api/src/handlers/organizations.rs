use axum::{
    extract::{Path, State},
    Extension, Json,
};
use common::models::{MemberView, OrgRole, Organization, UserClaims};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{ok, ok_with_message, ApiResult, ErrorResponse, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: String,
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    pub role: OrgRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: OrgRole,
}

fn caller_id(claims: &UserClaims) -> Result<Uuid, ErrorResponse> {
    claims
        .user_id()
        .ok_or_else(|| ErrorResponse::new("unauthorized", "Invalid token subject"))
}

/// Organizations the caller belongs to
#[tracing::instrument(skip_all)]
pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> ApiResult<Vec<Organization>> {
    let user_id = caller_id(&claims)?;
    ok(state.services.organizations.list_for_user(user_id).await?)
}

/// Create an organization owned by the caller
#[tracing::instrument(skip(state, claims, req), fields(name = %req.name))]
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(req): Json<CreateOrganizationRequest>,
) -> ApiResult<Organization> {
    let user_id = caller_id(&claims)?;
    if req.name.trim().is_empty() {
        return Err(ErrorResponse::new("validation_error", "Organization name is required"));
    }

    let org = state
        .services
        .organizations
        .create_organization(user_id, req.name.trim(), req.timezone.as_deref())
        .await?;
    ok_with_message(org, "Organization created; switch to it to start working")
}

#[tracing::instrument(skip_all)]
pub async fn get_organization(State(state): State<AppState>, scope: Scope) -> ApiResult<Organization> {
    ok(state.services.organizations.get(scope.org_id).await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn update_organization(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<UpdateOrganizationRequest>,
) -> ApiResult<Organization> {
    if req.name.trim().is_empty() {
        return Err(ErrorResponse::new("validation_error", "Organization name is required"));
    }
    ok(state
        .services
        .organizations
        .update(scope.org_id, req.name.trim(), &req.timezone)
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn delete_organization(State(state): State<AppState>, scope: Scope) -> ApiResult<()> {
    state.services.organizations.delete(scope.org_id).await?;
    ok_with_message((), "Organization deleted")
}

#[tracing::instrument(skip(state))]
pub async fn list_members(State(state): State<AppState>, scope: Scope) -> ApiResult<Vec<MemberView>> {
    ok(state.services.organizations.list_members(scope.org_id).await?)
}

#[tracing::instrument(skip(state, req), fields(role = %req.role))]
pub async fn add_member(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Vec<MemberView>> {
    // Only owners hand out ownership
    if req.role == OrgRole::Owner && scope.role != OrgRole::Owner {
        return Err(ErrorResponse::new("forbidden", "Only owners can add owners"));
    }

    state
        .services
        .organizations
        .add_member(scope.org_id, &req.email, req.role)
        .await?;
    ok(state.services.organizations.list_members(scope.org_id).await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn update_member_role(
    State(state): State<AppState>,
    scope: Scope,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<()> {
    state
        .services
        .organizations
        .update_member_role(scope.org_id, scope.role, user_id, req.role)
        .await?;
    ok_with_message((), "Member role updated")
}

#[tracing::instrument(skip(state))]
pub async fn remove_member(
    State(state): State<AppState>,
    scope: Scope,
    Path(user_id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .organizations
        .remove_member(scope.org_id, scope.role, user_id)
        .await?;
    ok_with_message((), "Member removed")
}
