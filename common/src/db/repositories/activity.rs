// Activity timeline repository

use super::queries::activity_queries::SELECT_ALL_COLUMNS;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::Activity;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ActivityRepository {
    pool: DbPool,
}

impl ActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, activity), fields(org_id = %activity.org_id))]
    pub async fn create(&self, activity: &Activity) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO activities (
                id, org_id, kind, subject, body, contact_id, deal_id,
                occurred_at, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(activity.id)
        .bind(activity.org_id)
        .bind(activity.kind.as_str())
        .bind(&activity.subject)
        .bind(&activity.body)
        .bind(activity.contact_id)
        .bind(activity.deal_id)
        .bind(activity.occurred_at)
        .bind(activity.created_by)
        .bind(activity.created_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(activity_id = %activity.id, kind = %activity.kind, "Activity logged");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_by_contact(&self, org_id: Uuid, contact_id: Uuid) -> Result<Vec<Activity>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM activities WHERE org_id = $1 AND contact_id = $2 ORDER BY occurred_at DESC",
            SELECT_ALL_COLUMNS
        );
        let activities = sqlx::query_as::<_, Activity>(&query)
            .bind(org_id)
            .bind(contact_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(activities)
    }

    #[instrument(skip(self))]
    pub async fn list_by_deal(&self, org_id: Uuid, deal_id: Uuid) -> Result<Vec<Activity>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM activities WHERE org_id = $1 AND deal_id = $2 ORDER BY occurred_at DESC",
            SELECT_ALL_COLUMNS
        );
        let activities = sqlx::query_as::<_, Activity>(&query)
            .bind(org_id)
            .bind(deal_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(activities)
    }

    #[instrument(skip(self))]
    pub async fn list_recent(&self, org_id: Uuid, limit: i64) -> Result<Vec<Activity>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM activities WHERE org_id = $1 ORDER BY occurred_at DESC LIMIT $2",
            SELECT_ALL_COLUMNS
        );
        let activities = sqlx::query_as::<_, Activity>(&query)
            .bind(org_id)
            .bind(limit)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(activities)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM activities WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Activity not found: {}", id)));
        }
        Ok(())
    }
}
