use axum::{extract::State, Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::action::ActionResult;
use common::models::{OrgRole, User, UserClaims};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::{ok, ok_with_message, ApiResult, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub org_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub org_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in_hours: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<OrgRole>,
}

/// HTTP-only cookie carrying the token for page requests
pub fn auth_cookie(name: &str, token: String, hours: i64) -> Cookie<'static> {
    Cookie::build((name.to_string(), token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(hours))
        .build()
}

#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<User> {
    if req.username.trim().is_empty() || req.password.len() < 8 || !req.email.contains('@') {
        return Err(ErrorResponse::new(
            "validation_error",
            "Username, a valid email and a password of at least 8 characters are required",
        ));
    }

    let user = state
        .services
        .auth
        .register(req.username.trim(), req.email.trim(), &req.password)
        .await?;
    ok_with_message(user, "Account created")
}

#[tracing::instrument(skip(state, jar, req), fields(username = %req.username))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ActionResult<TokenResponse>>), ErrorResponse> {
    let outcome = state
        .services
        .auth
        .login(&req.username, &req.password, req.org_slug.as_deref())
        .await?;

    let hours = state.services.auth.jwt().expiration_hours();
    let jar = jar.add(auth_cookie(
        &state.config.auth.cookie_name,
        outcome.token.clone(),
        hours,
    ));

    let response = TokenResponse {
        token: outcome.token,
        expires_in_hours: hours,
        org_id: outcome.scope.as_ref().map(|s| s.org_id),
        role: outcome.scope.as_ref().map(|s| s.role),
    };
    Ok((jar, Json(ActionResult::ok(response))))
}

#[tracing::instrument(skip(state, req))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<TokenResponse> {
    let token = state.services.auth.refresh(&req.token).await?;
    let claims = state.services.auth.jwt().decode_token(&token)?;
    ok(TokenResponse {
        token,
        expires_in_hours: state.services.auth.jwt().expiration_hours(),
        org_id: claims.org_id,
        role: claims.role,
    })
}

/// Re-issue the caller's token scoped to another organization
#[tracing::instrument(skip(state, claims, jar))]
pub async fn switch_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    jar: CookieJar,
    Json(req): Json<SwitchRequest>,
) -> Result<(CookieJar, Json<ActionResult<TokenResponse>>), ErrorResponse> {
    let token = state
        .services
        .auth
        .switch_organization(&claims, req.org_id)
        .await?;
    let switched = state.services.auth.jwt().decode_token(&token)?;
    let hours = state.services.auth.jwt().expiration_hours();

    let jar = jar.add(auth_cookie(&state.config.auth.cookie_name, token.clone(), hours));
    Ok((
        jar,
        Json(ActionResult::ok(TokenResponse {
            token,
            expires_in_hours: hours,
            org_id: switched.org_id,
            role: switched.role,
        })),
    ))
}

#[tracing::instrument(skip_all)]
pub async fn me(Extension(claims): Extension<UserClaims>) -> ApiResult<UserClaims> {
    ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_is_http_only() {
        let cookie = auth_cookie("tenantry_token", "abc".to_string(), 24);
        assert_eq!(cookie.name(), "tenantry_token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(24)));
    }
}
