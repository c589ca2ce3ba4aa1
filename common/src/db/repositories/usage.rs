// Usage counters per organization, metric and billing period

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{UsageMetric, UsageRecord};
use chrono::NaiveDate;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct UsageRepository {
    pool: DbPool,
}

impl UsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get(
        &self,
        org_id: Uuid,
        metric: UsageMetric,
        period_start: NaiveDate,
    ) -> Result<i64, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT quantity FROM usage_records WHERE org_id = $1 AND metric = $2 AND period_start = $3",
        )
        .bind(org_id)
        .bind(metric.as_str())
        .bind(period_start)
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(row.map(|(q,)| q).unwrap_or(0))
    }

    /// Add `quantity` to the period counter, creating it when missing; returns the new total
    #[instrument(skip(self))]
    pub async fn increment(
        &self,
        org_id: Uuid,
        metric: UsageMetric,
        period_start: NaiveDate,
        quantity: i64,
    ) -> Result<i64, DatabaseError> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO usage_records (org_id, metric, period_start, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (org_id, metric, period_start) DO UPDATE
            SET quantity = usage_records.quantity + EXCLUDED.quantity, updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(org_id)
        .bind(metric.as_str())
        .bind(period_start)
        .bind(quantity)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(total)
    }

    #[instrument(skip(self))]
    pub async fn list_for_period(
        &self,
        org_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Vec<UsageRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, UsageRecord>(
            r#"
            SELECT org_id, metric, period_start, quantity, updated_at
            FROM usage_records
            WHERE org_id = $1 AND period_start = $2
            "#,
        )
        .bind(org_id)
        .bind(period_start)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(records)
    }
}
