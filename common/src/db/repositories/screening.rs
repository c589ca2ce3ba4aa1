// Per-user sender decisions and the Screener queue

use super::queries::email_queries::DECISION_COLUMNS;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Placement, ScreeningBucket, ScreeningDecision};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// One sender waiting in the Screener
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScreenerSender {
    pub sender_email: String,
    pub sender_name: Option<String>,
    pub message_count: i64,
    pub latest_subject: String,
    pub latest_received_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ScreeningRepository {
    pool: DbPool,
}

impl ScreeningRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite the decision for `(user, sender)`; sender must be normalized
    #[instrument(skip(self))]
    pub async fn upsert_decision(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        sender_email: &str,
        bucket: ScreeningBucket,
    ) -> Result<ScreeningDecision, DatabaseError> {
        let query = format!(
            r#"
            INSERT INTO screening_decisions (id, org_id, user_id, sender_email, bucket)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, sender_email) DO UPDATE
            SET bucket = EXCLUDED.bucket, updated_at = NOW()
            RETURNING {}
            "#,
            DECISION_COLUMNS
        );
        let decision = sqlx::query_as::<_, ScreeningDecision>(&query)
            .bind(Uuid::new_v4())
            .bind(org_id)
            .bind(user_id)
            .bind(sender_email)
            .bind(bucket.as_str())
            .fetch_one(self.pool.pool())
            .await?;

        tracing::info!(user_id = %user_id, sender = %sender_email, bucket = %bucket, "Screening decision recorded");
        Ok(decision)
    }

    /// `true` when a decision existed
    #[instrument(skip(self))]
    pub async fn delete_decision(&self, user_id: Uuid, sender_email: &str) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("DELETE FROM screening_decisions WHERE user_id = $1 AND sender_email = $2")
                .bind(user_id)
                .bind(sender_email)
                .execute(self.pool.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    pub async fn list_decisions(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<ScreeningDecision>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM screening_decisions WHERE org_id = $1 AND user_id = $2 ORDER BY sender_email",
            DECISION_COLUMNS
        );
        let decisions = sqlx::query_as::<_, ScreeningDecision>(&query)
            .bind(org_id)
            .bind(user_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(decisions)
    }

    /// Decisions for a batch of normalized senders, keyed by sender
    #[instrument(skip(self, senders), fields(count = senders.len()))]
    pub async fn decisions_for_senders(
        &self,
        user_id: Uuid,
        senders: &[String],
    ) -> Result<HashMap<String, ScreeningBucket>, DatabaseError> {
        if senders.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!(
            "SELECT {} FROM screening_decisions WHERE user_id = $1 AND sender_email = ANY($2)",
            DECISION_COLUMNS
        );
        let decisions = sqlx::query_as::<_, ScreeningDecision>(&query)
            .bind(user_id)
            .bind(senders)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(decisions
            .into_iter()
            .map(|d| (d.sender_email, d.bucket))
            .collect())
    }

    /// Move every message from `sender` in the user's mailboxes; returns the count
    #[instrument(skip(self))]
    pub async fn refile_sender(
        &self,
        user_id: Uuid,
        sender_email: &str,
        placement: Placement,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE email_messages m
            SET placement = $3, auto_classified = FALSE
            FROM mailboxes b
            WHERE m.mailbox_id = b.id
              AND b.user_id = $1
              AND LOWER(m.from_email) = $2
            "#,
        )
        .bind(user_id)
        .bind(sender_email)
        .bind(placement.as_str())
        .execute(self.pool.pool())
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    pub async fn screener_queue(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<ScreenerSender>, DatabaseError> {
        let senders = sqlx::query_as::<_, ScreenerSender>(
            r#"
            SELECT DISTINCT ON (LOWER(m.from_email))
                LOWER(m.from_email) AS sender_email,
                m.from_name AS sender_name,
                COUNT(*) OVER (PARTITION BY LOWER(m.from_email)) AS message_count,
                m.subject AS latest_subject,
                m.received_at AS latest_received_at
            FROM email_messages m
            INNER JOIN mailboxes b ON b.id = m.mailbox_id
            WHERE m.org_id = $1 AND b.user_id = $2 AND m.placement = 'screener'
            ORDER BY LOWER(m.from_email), m.received_at DESC
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_all(self.pool.pool())
        .await?;
        Ok(senders)
    }
}
