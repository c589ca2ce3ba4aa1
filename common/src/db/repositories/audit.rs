// Audit trail for protected API requests

use crate::db::DbPool;
use crate::errors::DatabaseError;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuditRepository {
    pool: DbPool,
}

impl AuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn record(
        &self,
        org_id: Option<Uuid>,
        user_id: Option<Uuid>,
        method: &str,
        path: &str,
        status: u16,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (org_id, user_id, method, path, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(method)
        .bind(path)
        .bind(i32::from(status))
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }
}
