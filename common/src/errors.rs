// Error handling framework
// One enum per concern, funnelled into ApiError at the HTTP boundary

use thiserror::Error;

/// Authentication and authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Insufficient permissions: required {0}")]
    InsufficientPermissions(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("Not a member of organization: {0}")]
    NotAMember(String),

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

/// Redis-backed storage errors (locks, rate limits)
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    RedisError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Lock already held: {0}")]
    LockHeld(String),
}

/// Email provider (Nylas) errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Provider rate limited the request")]
    RateLimited,

    #[error("Provider response could not be decoded: {0}")]
    InvalidResponse(String),

    #[error("Grant not found or revoked: {0}")]
    GrantNotFound(String),

    #[error("No mailbox connected for user {0}")]
    NoMailbox(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RequestFailed(_) | ProviderError::RateLimited => true,
            ProviderError::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// LLM API errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    #[error("LLM returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM response could not be decoded: {0}")]
    InvalidResponse(String),
}

/// Billing and usage metering errors
#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Usage limit exceeded for {metric}: {used}/{limit}")]
    LimitExceeded {
        metric: String,
        used: i64,
        limit: i64,
    },

    #[error("Subscription not found for organization {0}")]
    SubscriptionNotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Onboarding workflow errors
#[derive(Error, Debug)]
pub enum OnboardingError {
    #[error("Step {0} is out of range")]
    StepOutOfRange(usize),

    #[error("Required fields missing: {0:?}")]
    MissingFields(Vec<String>),

    #[error("Session already completed")]
    AlreadyCompleted,

    #[error("Responses must be a JSON object")]
    InvalidResponses,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Webhook errors
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Missing webhook signature header")]
    MissingSignature,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Failure of a multi-step service operation, keeping the underlying cause
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Onboarding(#[from] OnboardingError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err.into())
    }
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = match err {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::AccountDisabled => "unauthorized",
            AuthError::InsufficientPermissions(_) | AuthError::NotAMember(_) => "forbidden",
            AuthError::UserNotFound(_) => "not_found",
            AuthError::UsernameTaken(_) => "conflict",
            AuthError::AuthenticationFailed(_) => "internal_error",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new("validation_error", err.to_string())
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        let code = match err {
            DatabaseError::NotFound(_) => "not_found",
            DatabaseError::DuplicateKey(_) => "conflict",
            DatabaseError::ForeignKeyViolation(_) => "validation_error",
            _ => "database_error",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let code = match err {
            StorageError::LockHeld(_) => "conflict",
            _ => "storage_error",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        let code = match err {
            ProviderError::NoMailbox(_) | ProviderError::GrantNotFound(_) => "not_found",
            ProviderError::RateLimited => "rate_limit_exceeded",
            _ => "provider_error",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        ApiError::new("llm_error", err.to_string())
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::LimitExceeded { .. } => {
                ApiError::new("usage_limit_exceeded", err.to_string())
            }
            BillingError::SubscriptionNotFound(_) => ApiError::new("not_found", err.to_string()),
            BillingError::Database(db) => db.into(),
        }
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        match err {
            OnboardingError::MissingFields(ref fields) => {
                let details = serde_json::json!({ "missing_fields": fields });
                ApiError::new("validation_error", err.to_string()).with_details(details)
            }
            OnboardingError::Database(db) => db.into(),
            OnboardingError::AlreadyCompleted => ApiError::new("conflict", err.to_string()),
            _ => ApiError::new("validation_error", err.to_string()),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        let code = match err {
            WebhookError::InvalidSignature | WebhookError::MissingSignature => "unauthorized",
            WebhookError::RateLimitExceeded => "rate_limit_exceeded",
            WebhookError::InvalidPayload(_) => "validation_error",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Auth(e) => e.into(),
            ServiceError::Validation(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::Storage(e) => e.into(),
            ServiceError::Provider(e) => e.into(),
            ServiceError::Llm(e) => e.into(),
            ServiceError::Billing(e) => e.into(),
            ServiceError::Onboarding(e) => e.into(),
        }
    }
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Check for specific database error codes
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for OnboardingError {
    fn from(err: sqlx::Error) -> Self {
        OnboardingError::Database(err.into())
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(err: sqlx::Error) -> Self {
        BillingError::Database(err.into())
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        StorageError::RedisError(err.to_string())
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::InvalidJson(err.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::RequestFailed(err.to_string())
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_to_api_error() {
        let err = AuthError::InvalidCredentials;
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "unauthorized");
    }

    #[test]
    fn test_not_a_member_is_forbidden() {
        let api_err: ApiError = AuthError::NotAMember("acme".to_string()).into();
        assert_eq!(api_err.code, "forbidden");
    }

    #[test]
    fn test_limit_exceeded_maps_to_usage_code() {
        let err = BillingError::LimitExceeded {
            metric: "ai_requests".to_string(),
            used: 50,
            limit: 50,
        };
        assert!(err.to_string().contains("50/50"));
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "usage_limit_exceeded");
    }

    #[test]
    fn test_missing_fields_carry_details() {
        let err = OnboardingError::MissingFields(vec!["company".to_string()]);
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "validation_error");
        assert_eq!(
            api_err.details,
            Some(serde_json::json!({ "missing_fields": ["company"] }))
        );
    }

    #[test]
    fn test_provider_transient_classification() {
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::UnexpectedStatus {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!ProviderError::UnexpectedStatus {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!ProviderError::GrantNotFound("g".to_string()).is_transient());
    }

    #[test]
    fn test_service_error_keeps_code_of_cause() {
        let err: ServiceError = DatabaseError::NotFound("deal".to_string()).into();
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "not_found");

        let err: ServiceError = ValidationError::invalid("role", "last owner").into();
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, "validation_error");
    }

    #[test]
    fn test_api_error_with_details() {
        let err = ApiError::new("TEST_ERROR", "Test message")
            .with_details(serde_json::json!({"field": "value"}));
        assert!(err.details.is_some());
    }
}
