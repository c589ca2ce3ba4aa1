use axum::{
    extract::{Path, Query, State},
    Json,
};
use common::email::{MailboxSyncService, SyncOutcome, ThreadView};
use common::models::{EmailMessage, EmailThread, Mailbox, Placement};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::contacts::page_from;
use crate::handlers::{ok, ok_with_message, ApiResult, ErrorResponse, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectMailboxRequest {
    pub grant_id: String,
    pub email_address: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageQueryParams {
    pub placement: Option<Placement>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default = "default_read")]
    pub read: bool,
}

fn default_read() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct DraftReplyRequest {
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendReplyRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SentResponse {
    pub provider_message_id: String,
}

#[tracing::instrument(skip(state, req))]
pub async fn connect_mailbox(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<ConnectMailboxRequest>,
) -> ApiResult<Mailbox> {
    let mailbox = state
        .services
        .email
        .connect_mailbox(scope.org_id, scope.user_id, &req.grant_id, &req.email_address)
        .await?;

    spawn_sync(state.services.sync.clone(), mailbox.id);
    ok_with_message(mailbox, "Mailbox connected; initial sync started")
}

#[tracing::instrument(skip(state))]
pub async fn list_mailboxes(State(state): State<AppState>, scope: Scope) -> ApiResult<Vec<Mailbox>> {
    ok(state
        .services
        .email
        .list_mailboxes(scope.org_id, scope.user_id)
        .await?)
}

/// Current sync status; clients poll this after triggering a sync
#[tracing::instrument(skip(state))]
pub async fn mailbox_status(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<Mailbox> {
    ok(state.services.email.mailbox(scope.org_id, scope.user_id, id).await?)
}

/// Run a sync in the background; the response returns immediately
pub fn spawn_sync(sync: MailboxSyncService, mailbox_id: Uuid) {
    tokio::spawn(async move {
        match sync.sync_mailbox(mailbox_id).await {
            Ok(SyncOutcome::Completed(report)) => {
                tracing::info!(mailbox_id = %mailbox_id, inserted = report.inserted, "Triggered sync finished");
            }
            Ok(SyncOutcome::AlreadyRunning) => {
                tracing::info!(mailbox_id = %mailbox_id, "Triggered sync skipped, already running");
            }
            Err(e) => {
                tracing::error!(mailbox_id = %mailbox_id, error = %e, "Triggered sync failed");
            }
        }
    });
}

#[tracing::instrument(skip(state))]
pub async fn trigger_sync(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<Mailbox> {
    let mailbox = state.services.email.mailbox(scope.org_id, scope.user_id, id).await?;
    spawn_sync(state.services.sync.clone(), mailbox.id);
    ok_with_message(mailbox, "Sync started")
}

#[tracing::instrument(skip(state))]
pub async fn list_messages(
    State(state): State<AppState>,
    scope: Scope,
    Query(params): Query<MessageQueryParams>,
) -> ApiResult<Vec<EmailMessage>> {
    let placement = params.placement.unwrap_or(Placement::Imbox);
    ok(state
        .services
        .email
        .list_by_placement(
            scope.org_id,
            scope.user_id,
            placement,
            page_from(params.limit, params.offset),
        )
        .await?)
}

#[tracing::instrument(skip(state, req))]
pub async fn mark_read(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<MarkReadRequest>,
) -> ApiResult<()> {
    state
        .services
        .email
        .mark_read(scope.org_id, scope.user_id, id, req.read)
        .await?;
    ok(())
}

/// Threads ordered by importance score
#[tracing::instrument(skip(state))]
pub async fn list_threads(
    State(state): State<AppState>,
    scope: Scope,
    Query(params): Query<PageParams>,
) -> ApiResult<Vec<EmailThread>> {
    ok(state
        .services
        .email
        .list_important_threads(scope.org_id, scope.user_id, page_from(params.limit, params.offset))
        .await?)
}

#[tracing::instrument(skip(state))]
pub async fn get_thread(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<ThreadView> {
    ok(state.services.email.thread(scope.org_id, scope.user_id, id).await?)
}

#[tracing::instrument(skip(state))]
pub async fn summarize_thread(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<TextResponse> {
    let text = state
        .services
        .email
        .summarize_thread(scope.org_id, scope.user_id, id)
        .await?;
    ok(TextResponse { text })
}

#[tracing::instrument(skip(state, req))]
pub async fn draft_reply(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    req: Option<Json<DraftReplyRequest>>,
) -> ApiResult<TextResponse> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let text = state
        .services
        .email
        .draft_reply(scope.org_id, scope.user_id, id, req.instructions.as_deref())
        .await?;
    ok(TextResponse { text })
}

#[tracing::instrument(skip(state, req))]
pub async fn send_reply(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<SendReplyRequest>,
) -> ApiResult<SentResponse> {
    if req.body.trim().is_empty() {
        return Err(ErrorResponse::new("validation_error", "Reply body is required"));
    }
    let provider_message_id = state
        .services
        .email
        .send_reply(scope.org_id, scope.user_id, id, &req.body)
        .await?;
    ok_with_message(SentResponse { provider_message_id }, "Reply sent")
}
