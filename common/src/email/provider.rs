// Provider-neutral message shapes and the seam the sync engine talks to

use crate::errors::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message as the provider reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub id: String,
    pub thread_id: String,
    pub from_email: String,
    pub from_name: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub snippet: String,
    pub body: Option<String>,
    pub received_at: DateTime<Utc>,
    pub unread: bool,
    pub has_list_unsubscribe: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePage {
    pub messages: Vec<ProviderMessage>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<String>,
}

#[cfg_attr(any(test, feature = "test-doubles"), mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// One page of messages, newest first, optionally only those after `received_after`
    async fn list_messages(
        &self,
        grant_id: &str,
        received_after: Option<DateTime<Utc>>,
        page_token: Option<String>,
        limit: u32,
    ) -> Result<MessagePage, ProviderError>;

    /// Send a message and return the provider's id for it
    async fn send_message(&self, grant_id: &str, message: OutgoingMessage) -> Result<String, ProviderError>;
}
