// Mailboxes, threads and messages

use super::queries::email_queries::{MAILBOX_COLUMNS, MESSAGE_COLUMNS, THREAD_COLUMNS};
use super::Pagination;
use crate::db::DbPool;
use crate::email::sync::SyncCheckpoint;
use crate::errors::DatabaseError;
use crate::models::{EmailMessage, EmailThread, ImportanceLevel, Mailbox, Placement, SyncStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Thread fields carried by an incoming message
#[derive(Debug, Clone)]
pub struct ThreadUpsert {
    pub org_id: Uuid,
    pub mailbox_id: Uuid,
    pub provider_thread_id: String,
    pub subject: String,
    pub participants: Vec<String>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub org_id: Uuid,
    pub mailbox_id: Uuid,
    pub thread_id: Uuid,
    pub provider_message_id: String,
    pub from_email: String,
    pub from_name: Option<String>,
    pub to_addresses: Vec<String>,
    pub subject: String,
    pub snippet: String,
    pub body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub unread: bool,
    pub placement: Placement,
    pub auto_classified: bool,
}

#[derive(Clone)]
pub struct EmailRepository {
    pool: DbPool,
}

impl EmailRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, mailbox), fields(org_id = %mailbox.org_id))]
    pub async fn create_mailbox(&self, mailbox: &Mailbox) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO mailboxes (
                id, org_id, user_id, provider, grant_id, email_address, sync_status,
                messages_synced, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(mailbox.id)
        .bind(mailbox.org_id)
        .bind(mailbox.user_id)
        .bind(&mailbox.provider)
        .bind(&mailbox.grant_id)
        .bind(&mailbox.email_address)
        .bind(mailbox.sync_status.as_str())
        .bind(mailbox.messages_synced)
        .bind(mailbox.created_at)
        .bind(mailbox.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(mailbox_id = %mailbox.id, email = %mailbox.email_address, "Mailbox connected");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_mailbox(&self, id: Uuid) -> Result<Option<Mailbox>, DatabaseError> {
        let query = format!("SELECT {} FROM mailboxes WHERE id = $1", MAILBOX_COLUMNS);
        let mailbox = sqlx::query_as::<_, Mailbox>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(mailbox)
    }

    #[instrument(skip(self))]
    pub async fn find_mailbox_for_user(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Mailbox>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM mailboxes WHERE org_id = $1 AND user_id = $2 AND id = $3",
            MAILBOX_COLUMNS
        );
        let mailbox = sqlx::query_as::<_, Mailbox>(&query)
            .bind(org_id)
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(mailbox)
    }

    #[instrument(skip(self))]
    pub async fn find_mailbox_by_grant(&self, grant_id: &str) -> Result<Option<Mailbox>, DatabaseError> {
        let query = format!("SELECT {} FROM mailboxes WHERE grant_id = $1", MAILBOX_COLUMNS);
        let mailbox = sqlx::query_as::<_, Mailbox>(&query)
            .bind(grant_id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(mailbox)
    }

    #[instrument(skip(self))]
    pub async fn list_mailboxes_for_user(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<Mailbox>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM mailboxes WHERE org_id = $1 AND user_id = $2 ORDER BY created_at",
            MAILBOX_COLUMNS
        );
        let mailboxes = sqlx::query_as::<_, Mailbox>(&query)
            .bind(org_id)
            .bind(user_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(mailboxes)
    }

    /// Oldest mailbox of the user in the org, used for outgoing mail
    #[instrument(skip(self))]
    pub async fn primary_mailbox(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<Mailbox>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM mailboxes WHERE org_id = $1 AND user_id = $2 ORDER BY created_at LIMIT 1",
            MAILBOX_COLUMNS
        );
        let mailbox = sqlx::query_as::<_, Mailbox>(&query)
            .bind(org_id)
            .bind(user_id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(mailbox)
    }

    /// Mailboxes the worker may pick up
    #[instrument(skip(self))]
    pub async fn list_syncable(&self, stale_after: Duration) -> Result<Vec<Mailbox>, DatabaseError> {
        // A `syncing` row older than the lock TTL was left behind by a crashed run
        let query = format!(
            r#"
            SELECT {} FROM mailboxes
            WHERE sync_status <> 'syncing'
               OR updated_at < NOW() - make_interval(secs => $1)
            ORDER BY last_synced_at NULLS FIRST
            "#,
            MAILBOX_COLUMNS
        );
        let mailboxes = sqlx::query_as::<_, Mailbox>(&query)
            .bind(stale_after.as_secs_f64())
            .fetch_all(self.pool.pool())
            .await?;
        Ok(mailboxes)
    }

    #[instrument(skip(self))]
    pub async fn set_sync_status(&self, id: Uuid, status: SyncStatus) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE mailboxes SET sync_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Mailbox not found: {}", id)));
        }
        Ok(())
    }

    /// Back to idle; `last_synced_at` only moves forward
    #[instrument(skip(self))]
    pub async fn mark_synced(
        &self,
        id: Uuid,
        checkpoint: &SyncCheckpoint,
        inserted: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE mailboxes
            SET sync_status = 'idle',
                last_synced_at = GREATEST(last_synced_at, $2),
                sync_cursor = $3,
                sync_high_water = $4,
                last_error = NULL,
                messages_synced = messages_synced + $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(checkpoint.watermark)
        .bind(checkpoint.cursor.as_deref())
        .bind(checkpoint.high_water)
        .bind(inserted)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    /// Record a failed run; the listing restarts from the watermark next time
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE mailboxes
            SET sync_status = 'error', sync_cursor = NULL, last_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    /// Insert or merge a thread, returning its id
    #[instrument(skip(self, thread), fields(provider_thread_id = %thread.provider_thread_id))]
    pub async fn upsert_thread(&self, thread: &ThreadUpsert) -> Result<Uuid, DatabaseError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO email_threads (
                id, org_id, mailbox_id, provider_thread_id, subject, participants, last_message_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (mailbox_id, provider_thread_id) DO UPDATE
            SET subject = CASE WHEN email_threads.subject = '' THEN EXCLUDED.subject ELSE email_threads.subject END,
                participants = ARRAY(
                    SELECT DISTINCT p FROM unnest(email_threads.participants || EXCLUDED.participants) AS p
                ),
                last_message_at = GREATEST(email_threads.last_message_at, EXCLUDED.last_message_at),
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(thread.org_id)
        .bind(thread.mailbox_id)
        .bind(&thread.provider_thread_id)
        .bind(&thread.subject)
        .bind(&thread.participants)
        .bind(thread.received_at)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(id)
    }

    /// `true` when inserted, `false` when the provider id was already stored
    #[instrument(skip(self, message), fields(provider_message_id = %message.provider_message_id))]
    pub async fn insert_message(&self, message: &NewMessage) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO email_messages (
                id, org_id, mailbox_id, thread_id, provider_message_id, from_email, from_name,
                to_addresses, subject, snippet, body, received_at, unread, placement, auto_classified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (mailbox_id, provider_message_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.org_id)
        .bind(message.mailbox_id)
        .bind(message.thread_id)
        .bind(&message.provider_message_id)
        .bind(&message.from_email)
        .bind(&message.from_name)
        .bind(&message.to_addresses)
        .bind(&message.subject)
        .bind(&message.snippet)
        .bind(&message.body)
        .bind(message.received_at)
        .bind(message.unread)
        .bind(message.placement.as_str())
        .bind(message.auto_classified)
        .execute(self.pool.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    pub async fn find_thread(&self, org_id: Uuid, id: Uuid) -> Result<Option<EmailThread>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM email_threads WHERE org_id = $1 AND id = $2",
            THREAD_COLUMNS
        );
        let thread = sqlx::query_as::<_, EmailThread>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(thread)
    }

    /// Thread plus the owning user, for access checks
    #[instrument(skip(self))]
    pub async fn find_thread_for_user(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<EmailThread>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM email_threads
            WHERE org_id = $1 AND id = $3
              AND mailbox_id IN (SELECT id FROM mailboxes WHERE user_id = $2)
            "#,
            THREAD_COLUMNS
        );
        let thread = sqlx::query_as::<_, EmailThread>(&query)
            .bind(org_id)
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(thread)
    }

    #[instrument(skip(self))]
    pub async fn list_thread_messages(&self, thread_id: Uuid) -> Result<Vec<EmailMessage>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM email_messages WHERE thread_id = $1 ORDER BY received_at ASC",
            MESSAGE_COLUMNS
        );
        let messages = sqlx::query_as::<_, EmailMessage>(&query)
            .bind(thread_id)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(messages)
    }

    #[instrument(skip(self))]
    pub async fn update_thread_score(
        &self,
        thread_id: Uuid,
        message_count: i32,
        score: i32,
        level: ImportanceLevel,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE email_threads
            SET message_count = $2, importance_score = $3, importance_level = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(thread_id)
        .bind(message_count)
        .bind(score)
        .bind(level.as_str())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    #[instrument(skip(self, summary))]
    pub async fn update_thread_summary(&self, thread_id: Uuid, summary: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE email_threads SET summary = $2, updated_at = NOW() WHERE id = $1")
            .bind(thread_id)
            .bind(summary)
            .execute(self.pool.pool())
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_threads_by_importance(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        page: Pagination,
    ) -> Result<Vec<EmailThread>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM email_threads
            WHERE org_id = $1
              AND mailbox_id IN (SELECT id FROM mailboxes WHERE user_id = $2)
            ORDER BY importance_score DESC, last_message_at DESC
            LIMIT $3 OFFSET $4
            "#,
            THREAD_COLUMNS
        );
        let threads = sqlx::query_as::<_, EmailThread>(&query)
            .bind(org_id)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(threads)
    }

    #[instrument(skip(self))]
    pub async fn list_by_placement(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        placement: Placement,
        page: Pagination,
    ) -> Result<Vec<EmailMessage>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM email_messages
            WHERE org_id = $1
              AND mailbox_id IN (SELECT id FROM mailboxes WHERE user_id = $2)
              AND placement = $3
            ORDER BY received_at DESC
            LIMIT $4 OFFSET $5
            "#,
            MESSAGE_COLUMNS
        );
        let messages = sqlx::query_as::<_, EmailMessage>(&query)
            .bind(org_id)
            .bind(user_id)
            .bind(placement.as_str())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(messages)
    }

    #[instrument(skip(self))]
    pub async fn set_unread(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        message_id: Uuid,
        unread: bool,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE email_messages
            SET unread = $4
            WHERE org_id = $1 AND id = $3
              AND mailbox_id IN (SELECT id FROM mailboxes WHERE user_id = $2)
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(message_id)
        .bind(unread)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Message not found: {}", message_id)));
        }
        Ok(())
    }
}
