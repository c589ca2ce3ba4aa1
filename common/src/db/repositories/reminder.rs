// Reminders and in-app notifications

use super::queries::reminder_queries::{NOTIFICATION_COLUMNS, REMINDER_COLUMNS};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Notification, Reminder, ReminderStatus};
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReminderRepository {
    pool: DbPool,
}

impl ReminderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, reminder), fields(org_id = %reminder.org_id))]
    pub async fn create(&self, reminder: &Reminder) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO reminders (
                id, org_id, user_id, title, notes, entity_type, entity_id, due_at,
                remind_before_minutes, channel, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(reminder.id)
        .bind(reminder.org_id)
        .bind(reminder.user_id)
        .bind(&reminder.title)
        .bind(&reminder.notes)
        .bind(&reminder.entity_type)
        .bind(reminder.entity_id)
        .bind(reminder.due_at)
        .bind(reminder.remind_before_minutes)
        .bind(reminder.channel.as_str())
        .bind(reminder.status.as_str())
        .bind(reminder.created_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(reminder_id = %reminder.id, due_at = %reminder.due_at, "Reminder created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_for_user(&self, org_id: Uuid, user_id: Uuid, id: Uuid) -> Result<Option<Reminder>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM reminders WHERE org_id = $1 AND user_id = $2 AND id = $3",
            REMINDER_COLUMNS
        );
        let reminder = sqlx::query_as::<_, Reminder>(&query)
            .bind(org_id)
            .bind(user_id)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(reminder)
    }

    #[instrument(skip(self))]
    pub async fn list_upcoming(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Reminder>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM reminders
            WHERE org_id = $1 AND user_id = $2 AND status = 'pending'
            ORDER BY due_at ASC
            LIMIT $3
            "#,
            REMINDER_COLUMNS
        );
        let reminders = sqlx::query_as::<_, Reminder>(&query)
            .bind(org_id)
            .bind(user_id)
            .bind(limit)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(reminders)
    }

    /// Pending reminders whose notify time has passed, oldest first
    #[instrument(skip(self))]
    pub async fn list_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Reminder>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM reminders
            WHERE status = 'pending'
              AND due_at - make_interval(mins => remind_before_minutes) <= $1
            ORDER BY due_at - make_interval(mins => remind_before_minutes) ASC
            LIMIT $2
            "#,
            REMINDER_COLUMNS
        );
        let reminders = sqlx::query_as::<_, Reminder>(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(reminders)
    }

    /// Move a reminder out of `pending`, only if it is still pending at `due_at`
    ///
    /// Returns `false` when it was cancelled or snoozed in the meantime.
    #[instrument(skip(self))]
    pub async fn finish_pending(
        &self,
        id: Uuid,
        due_at: DateTime<Utc>,
        status: ReminderStatus,
        sent_at: Option<DateTime<Utc>>,
        last_error: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET status = $3, sent_at = $4, last_error = $5
            WHERE id = $1 AND due_at = $2 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(due_at)
        .bind(status.as_str())
        .bind(sent_at)
        .bind(last_error)
        .execute(self.pool.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move the due time and make the reminder pending again
    #[instrument(skip(self))]
    pub async fn reschedule(&self, id: Uuid, due_at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE reminders
            SET due_at = $2, status = 'pending', sent_at = NULL, last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(due_at)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Reminder not found: {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self, notification), fields(user_id = %notification.user_id))]
    pub async fn create_notification(&self, notification: &Notification) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, org_id, user_id, title, body, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(notification.org_id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_notifications(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE org_id = $1 AND user_id = $2 AND (NOT $3 OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT 100
            "#,
            NOTIFICATION_COLUMNS
        );
        let notifications = sqlx::query_as::<_, Notification>(&query)
            .bind(org_id)
            .bind(user_id)
            .bind(unread_only)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(notifications)
    }

    #[instrument(skip(self))]
    pub async fn mark_notification_read(&self, org_id: Uuid, user_id: Uuid, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE org_id = $1 AND user_id = $2 AND id = $3
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(id)
        .execute(self.pool.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Notification not found: {}", id)));
        }
        Ok(())
    }
}
