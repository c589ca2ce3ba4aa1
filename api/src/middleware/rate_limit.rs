use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Best-effort client identifier from proxy headers
pub fn request_source(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-source request limit for public endpoints (webhooks, login)
///
/// Redis failures let the request through.
#[tracing::instrument(skip_all)]
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = format!("{}:{}", req.uri().path(), request_source(req.headers()));
    let limits = &state.config.rate_limit;

    match state
        .rate_limiter
        .check_rate_limit(&key, limits.webhook_max_requests, limits.webhook_window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => ErrorResponse::new("rate_limit_exceeded", "Too many requests").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Rate limiter unavailable, allowing request");
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_first_forwarded_address_is_the_source() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(request_source(&headers), "203.0.113.7");
    }

    #[test]
    fn test_unknown_source() {
        assert_eq!(request_source(&HeaderMap::new()), "unknown");
    }
}
