pub mod activities;
pub mod auth;
pub mod billing;
pub mod campaigns;
pub mod contacts;
pub mod deals;
pub mod emails;
pub mod health;
pub mod metrics;
pub mod onboarding;
pub mod organizations;
pub mod pages;
pub mod projects;
pub mod reminders;
pub mod screening;
pub mod webhooks;

// Common response types
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::action::ActionResult;
use common::errors::{
    ApiError, AuthError, BillingError, DatabaseError, LlmError, OnboardingError, ProviderError,
    ServiceError, StorageError, ValidationError, WebhookError,
};
use common::models::{OrgRole, UserClaims};
use serde::Serialize;
use uuid::Uuid;

/// Failure envelope: `{ isSuccess: false, error, message, traceId }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub is_success: bool,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error: error.into(),
            message: message.into(),
            details: None,
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        status_for(&self.error)
    }
}

/// HTTP status for an error code
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "forbidden" => StatusCode::FORBIDDEN,
        "not_found" => StatusCode::NOT_FOUND,
        "validation_error" => StatusCode::BAD_REQUEST,
        "conflict" => StatusCode::CONFLICT,
        "rate_limit_exceeded" | "usage_limit_exceeded" => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.error, message = %self.message, trace_id = %self.trace_id, "Request failed");
        }
        (status, Json(self)).into_response()
    }
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        let response = ErrorResponse::new(err.code, err.message);
        match err.details {
            Some(details) => response.with_details(details),
            None => response,
        }
    }
}

macro_rules! error_response_from {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for ErrorResponse {
                fn from(err: $error) -> Self {
                    ApiError::from(err).into()
                }
            }
        )+
    };
}

error_response_from!(
    AuthError,
    ValidationError,
    DatabaseError,
    StorageError,
    ProviderError,
    LlmError,
    BillingError,
    OnboardingError,
    WebhookError,
    ServiceError,
);

/// Handler result wrapped in the `{ isSuccess, message?, data? }` envelope
pub type ApiResult<T> = Result<Json<ActionResult<T>>, ErrorResponse>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ActionResult::ok(data)))
}

pub fn ok_with_message<T>(data: T, message: impl Into<String>) -> ApiResult<T> {
    Ok(Json(ActionResult::ok_with_message(data, message)))
}

pub fn not_found(what: &str) -> ErrorResponse {
    ErrorResponse::new("not_found", format!("{} not found", what))
}

/// Caller identity scoped to the organization carried by the token
#[derive(Debug, Clone)]
pub struct Scope {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub role: OrgRole,
}

impl Scope {
    pub fn from_claims(claims: &UserClaims) -> Result<Self, ErrorResponse> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| ErrorResponse::new("unauthorized", "Invalid token subject"))?;
        let (org_id, role) = claims.org_id.zip(claims.role).ok_or_else(|| {
            ErrorResponse::new("forbidden", "No active organization; create or switch to one")
        })?;
        Ok(Self {
            org_id,
            user_id,
            username: claims.username.clone(),
            role,
        })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Scope {
    type Rejection = ErrorResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<UserClaims>()
            .ok_or_else(|| ErrorResponse::new("unauthorized", "Authentication required"))?;
        Scope::from_claims(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(org: Option<Uuid>, role: Option<OrgRole>) -> UserClaims {
        UserClaims {
            sub: Uuid::new_v4().to_string(),
            username: "ada".to_string(),
            org_id: org,
            role,
            permissions: vec![],
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for("unauthorized"), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for("forbidden"), StatusCode::FORBIDDEN);
        assert_eq!(status_for("not_found"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("validation_error"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("conflict"), StatusCode::CONFLICT);
        assert_eq!(status_for("rate_limit_exceeded"), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for("usage_limit_exceeded"), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for("database_error"), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_envelope_shape() {
        let json = serde_json::to_value(ErrorResponse::new("not_found", "Deal not found")).unwrap();
        assert_eq!(json["isSuccess"], false);
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["message"], "Deal not found");
        assert!(json["traceId"].is_string());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_billing_limit_maps_to_429() {
        let err = BillingError::LimitExceeded {
            metric: "contacts".to_string(),
            used: 250,
            limit: 250,
        };
        let response = ErrorResponse::from(err);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_missing_fields_carry_details() {
        let err = OnboardingError::MissingFields(vec!["company".to_string()]);
        let response = ErrorResponse::from(err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.details,
            Some(serde_json::json!({ "missing_fields": ["company"] }))
        );
    }

    #[test]
    fn test_scope_requires_active_org() {
        let err = Scope::from_claims(&claims(None, None)).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let org = Uuid::new_v4();
        let scope = Scope::from_claims(&claims(Some(org), Some(OrgRole::Member))).unwrap();
        assert_eq!(scope.org_id, org);
        assert_eq!(scope.role, OrgRole::Member);
    }
}
