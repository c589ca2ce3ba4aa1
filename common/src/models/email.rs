use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::string_enum;

string_enum! {
    pub enum SyncStatus {
        Idle => "idle",
        Syncing => "syncing",
        Error => "error",
    }
}

/// A user's connected mailbox at the email provider
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Mailbox {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub grant_id: String,
    pub email_address: String,
    #[sqlx(try_from = "String")]
    pub sync_status: SyncStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Provider cursor of an unfinished listing, resumed on the next sync
    pub sync_cursor: Option<String>,
    /// Newest `received_at` seen by the unfinished listing
    pub sync_high_water: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub messages_synced: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

string_enum! {
    /// The buckets a screening decision can file a sender into
    pub enum ScreeningBucket {
        Imbox => "imbox",
        Feed => "feed",
        PaperTrail => "paper_trail",
        Blocked => "blocked",
    }
}

string_enum! {
    /// Where a message is shown: the Screener until its sender is decided
    pub enum Placement {
        Screener => "screener",
        Imbox => "imbox",
        Feed => "feed",
        PaperTrail => "paper_trail",
        Blocked => "blocked",
    }
}

impl From<ScreeningBucket> for Placement {
    fn from(bucket: ScreeningBucket) -> Self {
        match bucket {
            ScreeningBucket::Imbox => Placement::Imbox,
            ScreeningBucket::Feed => Placement::Feed,
            ScreeningBucket::PaperTrail => Placement::PaperTrail,
            ScreeningBucket::Blocked => Placement::Blocked,
        }
    }
}

string_enum! {
    pub enum ImportanceLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailThread {
    pub id: Uuid,
    pub org_id: Uuid,
    pub mailbox_id: Uuid,
    pub provider_thread_id: String,
    pub subject: String,
    pub participants: Vec<String>,
    pub message_count: i32,
    pub last_message_at: DateTime<Utc>,
    pub importance_score: i32,
    #[sqlx(try_from = "String")]
    pub importance_level: ImportanceLevel,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailMessage {
    pub id: Uuid,
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
    #[sqlx(try_from = "String")]
    pub placement: Placement,
    pub auto_classified: bool,
    pub created_at: DateTime<Utc>,
}

/// Per-user, per-sender decision applied to current and future mail
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScreeningDecision {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub sender_email: String,
    #[sqlx(try_from = "String")]
    pub bucket: ScreeningBucket,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
