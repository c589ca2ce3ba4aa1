// Authentication and JWT token handling

use crate::db::repositories::{OrganizationRepository, UserRepository};
use crate::errors::{AuthError, DatabaseError};
use crate::models::{Membership, OrgRole, User, UserClaims};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::{error, instrument};
use uuid::Uuid;

/// JWT token service for encoding and decoding tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    expiration_hours: i64,
}

/// Organization context carried in a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgScope {
    pub org_id: Uuid,
    pub role: OrgRole,
}

impl From<&Membership> for OrgScope {
    fn from(membership: &Membership) -> Self {
        Self {
            org_id: membership.org_id,
            role: membership.role,
        }
    }
}

impl JwtService {
    /// Create a new JWT service with the given secret and expiration
    #[instrument(skip(secret))]
    pub fn new(secret: &str, expiration_hours: u64) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            expiration_hours: expiration_hours as i64,
        }
    }

    pub fn expiration_hours(&self) -> i64 {
        self.expiration_hours
    }

    /// Encode a token; permissions follow the role in `scope`, none without one
    #[instrument(skip(self))]
    pub fn encode_token(
        &self,
        user_id: Uuid,
        username: &str,
        scope: Option<OrgScope>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.expiration_hours)).timestamp();
        let iat = now.timestamp();

        let claims = UserClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            org_id: scope.map(|s| s.org_id),
            role: scope.map(|s| s.role),
            permissions: scope.map(|s| s.role.permissions()).unwrap_or_default(),
            exp,
            iat,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to encode JWT token");
            AuthError::AuthenticationFailed(format!("Failed to encode token: {}", e))
        })
    }

    /// Decode and validate a JWT token
    #[instrument(skip(self, token))]
    pub fn decode_token(&self, token: &str) -> Result<UserClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data =
            decode::<UserClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::debug!(error = %e, "Rejected JWT token");
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(format!("Token validation failed: {}", e)),
                }
            })?;

        Ok(token_data.claims)
    }
}

/// Issued token plus the organization it is scoped to
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
    pub scope: Option<OrgScope>,
}

fn db_failure(e: DatabaseError) -> AuthError {
    error!(error = %e, "Database error during authentication");
    AuthError::AuthenticationFailed(format!("Database error: {}", e))
}

/// Credential checks and token issuance backed by the users and memberships tables
#[derive(Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    users: UserRepository,
    organizations: OrganizationRepository,
}

impl AuthService {
    pub fn new(jwt_service: JwtService, users: UserRepository, organizations: OrganizationRepository) -> Self {
        Self {
            jwt_service,
            users,
            organizations,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Create a login account with a bcrypt-hashed password
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AuthError::AuthenticationFailed(
                "username, email and password are required".to_string(),
            ));
        }

        let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            AuthError::AuthenticationFailed(format!("Password hashing failed: {}", e))
        })?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            email,
            enabled: true,
            created_at: now,
            updated_at: now,
        };

        self.users.create(&user).await.map_err(|e| match e {
            DatabaseError::DuplicateKey(_) => AuthError::UsernameTaken(username.to_string()),
            other => db_failure(other),
        })?;

        tracing::info!(user_id = %user.id, username = %username, "User registered");
        Ok(user)
    }

    /// Verify credentials and issue a token scoped to `org_slug` or the first membership
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        org_slug: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await
            .map_err(db_failure)?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_valid = bcrypt::verify(password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            AuthError::AuthenticationFailed(format!("Password verification failed: {}", e))
        })?;
        if !password_valid {
            tracing::warn!(username = %username, "Invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.enabled {
            tracing::warn!(username = %username, "Login attempt on disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let membership = match org_slug.filter(|s| !s.is_empty()) {
            Some(slug) => {
                let org = self
                    .organizations
                    .find_by_slug(slug)
                    .await
                    .map_err(db_failure)?
                    .ok_or_else(|| AuthError::NotAMember(slug.to_string()))?;
                Some(
                    self.organizations
                        .get_membership(org.id, user.id)
                        .await
                        .map_err(db_failure)?
                        .ok_or_else(|| AuthError::NotAMember(slug.to_string()))?,
                )
            }
            None => self.organizations.first_membership(user.id).await.map_err(db_failure)?,
        };

        let scope = membership.as_ref().map(OrgScope::from);
        let token = self.jwt_service.encode_token(user.id, &user.username, scope)?;

        tracing::info!(user_id = %user.id, org_id = ?scope.map(|s| s.org_id), "User logged in");
        Ok(LoginOutcome { token, user, scope })
    }

    /// Issue a token for another organization the user belongs to
    #[instrument(skip(self, claims), fields(user = %claims.sub))]
    pub async fn switch_organization(&self, claims: &UserClaims, org_id: Uuid) -> Result<String, AuthError> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::InvalidToken("subject is not a user id".to_string()))?;

        let membership = self
            .organizations
            .get_membership(org_id, user_id)
            .await
            .map_err(db_failure)?
            .ok_or_else(|| AuthError::NotAMember(org_id.to_string()))?;

        self.jwt_service
            .encode_token(user_id, &claims.username, Some(OrgScope::from(&membership)))
    }

    /// Re-issue a still-valid token, reloading the role so revoked access is not renewed
    #[instrument(skip(self, token))]
    pub async fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.jwt_service.decode_token(token)?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::InvalidToken("subject is not a user id".to_string()))?;

        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(db_failure)?
            .ok_or_else(|| AuthError::UserNotFound(user_id.to_string()))?;
        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }

        let scope = match claims.org_id {
            Some(org_id) => Some(
                self.organizations
                    .get_membership(org_id, user_id)
                    .await
                    .map_err(db_failure)?
                    .map(|m| OrgScope::from(&m))
                    .ok_or_else(|| AuthError::NotAMember(org_id.to_string()))?,
            ),
            None => None,
        };

        self.jwt_service.encode_token(user.id, &user.username, scope)
    }
}
