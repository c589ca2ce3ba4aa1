// Deal repository

use super::queries::deal_queries::SELECT_ALL_COLUMNS;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Deal, DealStage};
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct DealRepository {
    pool: DbPool,
}

impl DealRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, deal), fields(org_id = %deal.org_id))]
    pub async fn create(&self, deal: &Deal) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO deals (
                id, org_id, title, value, currency, stage, contact_id, owner_id,
                expected_close_date, closed_at, lost_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(deal.id)
        .bind(deal.org_id)
        .bind(&deal.title)
        .bind(deal.value)
        .bind(&deal.currency)
        .bind(deal.stage.as_str())
        .bind(deal.contact_id)
        .bind(deal.owner_id)
        .bind(deal.expected_close_date)
        .bind(deal.closed_at)
        .bind(&deal.lost_reason)
        .bind(deal.created_at)
        .bind(deal.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(deal_id = %deal.id, stage = %deal.stage, "Deal created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, org_id: Uuid, id: Uuid) -> Result<Option<Deal>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM deals WHERE org_id = $1 AND id = $2",
            SELECT_ALL_COLUMNS
        );
        let deal = sqlx::query_as::<_, Deal>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(deal)
    }

    /// Deals of the org, optionally narrowed to one stage
    #[instrument(skip(self))]
    pub async fn list(&self, org_id: Uuid, stage: Option<DealStage>) -> Result<Vec<Deal>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM deals
            WHERE org_id = $1 AND ($2::TEXT IS NULL OR stage = $2)
            ORDER BY created_at DESC
            "#,
            SELECT_ALL_COLUMNS
        );
        let deals = sqlx::query_as::<_, Deal>(&query)
            .bind(org_id)
            .bind(stage.map(|s| s.as_str()))
            .fetch_all(self.pool.pool())
            .await?;
        Ok(deals)
    }

    #[instrument(skip(self, deal), fields(deal_id = %deal.id))]
    pub async fn update(&self, deal: &Deal) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE deals
            SET title = $3, value = $4, currency = $5, contact_id = $6, owner_id = $7,
                expected_close_date = $8, updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(deal.org_id)
        .bind(deal.id)
        .bind(&deal.title)
        .bind(deal.value)
        .bind(&deal.currency)
        .bind(deal.contact_id)
        .bind(deal.owner_id)
        .bind(deal.expected_close_date)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Deal not found: {}", deal.id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_stage(
        &self,
        org_id: Uuid,
        id: Uuid,
        stage: DealStage,
        closed_at: Option<DateTime<Utc>>,
        lost_reason: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE deals
            SET stage = $3, closed_at = $4, lost_reason = $5, updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(org_id)
        .bind(id)
        .bind(stage.as_str())
        .bind(closed_at)
        .bind(lost_reason)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Deal not found: {}", id)));
        }
        tracing::info!(deal_id = %id, stage = %stage, "Deal stage changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM deals WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Deal not found: {}", id)));
        }
        tracing::info!(deal_id = %id, "Deal deleted");
        Ok(())
    }
}
