use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Bearer token from the Authorization header, else the auth cookie
pub fn extract_token(headers: &HeaderMap, jar: &CookieJar, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => jar.get(cookie_name).map(|c| c.value().to_string()),
    }
}

/// Authentication middleware that validates JWT tokens
///
/// JSON routes answer 401; page routes redirect to the login page.
#[tracing::instrument(skip_all)]
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let is_api = req.uri().path().starts_with("/api");
    let token = extract_token(req.headers(), &jar, &state.config.auth.cookie_name);

    let claims = match token {
        Some(token) => state.services.auth.jwt().decode_token(&token),
        None => {
            return reject(is_api, ErrorResponse::new("unauthorized", "Missing authentication token"));
        }
    };

    match claims {
        Ok(claims) => {
            // Insert claims into request extensions for use by handlers
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected authentication token");
            reject(is_api, e.into())
        }
    }
}

fn reject(is_api: bool, error: ErrorResponse) -> Response {
    if is_api {
        error.into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        let jar = CookieJar::new().add(Cookie::new("tenantry_token", "cookie"));
        assert_eq!(
            extract_token(&headers, &jar, "tenantry_token"),
            Some("abc".to_string())
        );
    }

    #[test]
    fn test_falls_back_to_cookie() {
        let jar = CookieJar::new().add(Cookie::new("tenantry_token", "cookie"));
        assert_eq!(
            extract_token(&HeaderMap::new(), &jar, "tenantry_token"),
            Some("cookie".to_string())
        );
    }

    #[test]
    fn test_non_bearer_scheme_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(extract_token(&headers, &CookieJar::new(), "tenantry_token"), None);
    }
}
