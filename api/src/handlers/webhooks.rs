use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use common::webhook::{verify_signature, WebhookEvent, SIGNATURE_HEADER};
use serde::Deserialize;

use crate::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub challenge: Option<String>,
}

/// Endpoint verification: echo the `challenge` parameter as plain text
#[tracing::instrument(skip_all)]
pub async fn nylas_challenge(Query(query): Query<ChallengeQuery>) -> impl IntoResponse {
    match query.challenge {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => ErrorResponse::new("validation_error", "Missing challenge parameter").into_response(),
    }
}

/// Provider notification: verify the signature, then trigger a sync for new mail
#[tracing::instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn nylas_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ErrorResponse> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());
    verify_signature(&body, signature, &state.config.email_provider.webhook_secret).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook");
        e
    })?;

    let event = WebhookEvent::parse(&body)?;
    tracing::info!(event_type = %event.event_type, grant_id = ?event.grant_id(), "Received webhook");

    if !event.triggers_sync() {
        return Ok(StatusCode::OK);
    }

    if let Some(grant_id) = event.grant_id().map(str::to_string) {
        let sync = state.services.sync.clone();
        tokio::spawn(async move {
            match sync.sync_grant(&grant_id).await {
                Ok(Some(outcome)) => tracing::info!(grant_id = %grant_id, outcome = ?outcome, "Webhook sync finished"),
                Ok(None) => {}
                Err(e) => tracing::error!(grant_id = %grant_id, error = %e, "Webhook sync failed"),
            }
        });
    }

    Ok(StatusCode::OK)
}
