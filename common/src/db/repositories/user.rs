// User repository: login accounts

use super::queries::user_queries;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::User;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn create(&self, user: &User) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, email, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.enabled)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM users WHERE username = $1",
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM users WHERE id = $1",
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET enabled = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User not found: {}", id)));
        }
        Ok(())
    }
}
