use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use common::contacts::{ImportSummary, NewContact};
use common::db::repositories::{ContactFilter, Pagination};
use common::models::Contact;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::{not_found, ok, ok_with_message, ApiResult, ErrorResponse, Scope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContactQueryParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Page of results plus the unpaginated total
#[derive(Debug, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub fn page_from(limit: Option<i64>, offset: Option<i64>) -> Pagination {
    let defaults = Pagination::default();
    Pagination::new(limit.unwrap_or(defaults.limit), offset.unwrap_or(defaults.offset))
}

#[tracing::instrument(skip(state))]
pub async fn list_contacts(
    State(state): State<AppState>,
    scope: Scope,
    Query(params): Query<ContactQueryParams>,
) -> ApiResult<Paged<Contact>> {
    let page = page_from(params.limit, params.offset);
    let filter = ContactFilter {
        search: params.search.filter(|s| !s.trim().is_empty()),
        status: params.status,
    };

    let (items, total) = state
        .services
        .repos
        .contacts
        .list(scope.org_id, &filter, page)
        .await?;

    ok(Paged {
        items,
        total,
        limit: page.limit,
        offset: page.offset,
    })
}

#[tracing::instrument(skip(state, req))]
pub async fn create_contact(
    State(state): State<AppState>,
    scope: Scope,
    Json(req): Json<NewContact>,
) -> ApiResult<Contact> {
    let contact = state
        .services
        .contacts
        .create(scope.org_id, Some(scope.user_id), req)
        .await?;
    ok(contact)
}

#[tracing::instrument(skip(state))]
pub async fn get_contact(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<Contact> {
    let contact = state
        .services
        .repos
        .contacts
        .find_by_id(scope.org_id, id)
        .await?
        .ok_or_else(|| not_found("Contact"))?;
    ok(contact)
}

#[tracing::instrument(skip(state, req))]
pub async fn update_contact(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
    Json(req): Json<NewContact>,
) -> ApiResult<Contact> {
    ok(state.services.contacts.update(scope.org_id, id, req).await?)
}

#[tracing::instrument(skip(state))]
pub async fn delete_contact(
    State(state): State<AppState>,
    scope: Scope,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state.services.repos.contacts.delete(scope.org_id, id).await?;
    ok_with_message((), "Contact deleted")
}

/// Import contacts from a CSV request body
#[tracing::instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn import_contacts(
    State(state): State<AppState>,
    scope: Scope,
    body: Bytes,
) -> ApiResult<ImportSummary> {
    if body.is_empty() {
        return Err(ErrorResponse::new("validation_error", "CSV body is empty"));
    }

    let summary = state
        .services
        .contacts
        .import_csv(scope.org_id, Some(scope.user_id), &body)
        .await?;

    let message = format!(
        "Imported {}, skipped {}, failed {}",
        summary.imported, summary.skipped, summary.failed
    );
    ok_with_message(summary, message)
}

/// Export every contact of the organization as CSV
#[tracing::instrument(skip(state))]
pub async fn export_contacts(
    State(state): State<AppState>,
    scope: Scope,
) -> Result<impl IntoResponse, ErrorResponse> {
    let csv = state.services.contacts.export_csv(scope.org_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"contacts.csv\""),
        ],
        csv,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamping() {
        let page = page_from(None, None);
        assert_eq!(page.limit, 50);
        assert_eq!(page.offset, 0);

        let page = page_from(Some(5_000), Some(-1));
        assert_eq!(page.limit, Pagination::MAX_LIMIT);
        assert_eq!(page.offset, 0);
    }
}
