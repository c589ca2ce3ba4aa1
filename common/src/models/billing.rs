use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::string_enum;

string_enum! {
    pub enum PlanTier {
        Free => "free",
        Starter => "starter",
        Pro => "pro",
        Enterprise => "enterprise",
    }
}

string_enum! {
    pub enum UsageMetric {
        Seats => "seats",
        Contacts => "contacts",
        EmailsSynced => "emails_synced",
        AiRequests => "ai_requests",
        VoiceMinutes => "voice_minutes",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub org_id: Uuid,
    #[sqlx(try_from = "String")]
    pub plan: PlanTier,
    pub status: String,
    pub current_period_start: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecord {
    pub org_id: Uuid,
    #[sqlx(try_from = "String")]
    pub metric: UsageMetric,
    pub period_start: NaiveDate,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}
