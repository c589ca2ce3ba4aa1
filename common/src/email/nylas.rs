// Nylas v3 REST client

use super::provider::{EmailProvider, MessagePage, OutgoingMessage, ProviderMessage};
use crate::config::EmailProviderConfig;
use crate::errors::ProviderError;
use crate::retry::ExponentialBackoff;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Participant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    email: String,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NylasMessage {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Vec<Participant>,
    #[serde(default)]
    to: Vec<Participant>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    body: Option<String>,
    date: i64,
    #[serde(default)]
    unread: bool,
    #[serde(default)]
    headers: Vec<Header>,
}

impl NylasMessage {
    fn into_provider_message(self) -> Result<ProviderMessage, ProviderError> {
        let received_at = Utc
            .timestamp_opt(self.date, 0)
            .single()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("bad date {} on {}", self.date, self.id)))?;
        let sender = self.from.into_iter().next();
        let has_list_unsubscribe = self
            .headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("list-unsubscribe"));

        Ok(ProviderMessage {
            thread_id: self.thread_id.unwrap_or_else(|| self.id.clone()),
            from_email: sender
                .as_ref()
                .map(|p| p.email.trim().to_lowercase())
                .unwrap_or_default(),
            from_name: sender.and_then(|p| p.name).filter(|n| !n.is_empty()),
            to: self.to.into_iter().map(|p| p.email.trim().to_lowercase()).collect(),
            subject: self.subject.unwrap_or_default(),
            snippet: self.snippet.unwrap_or_default(),
            body: self.body,
            received_at,
            unread: self.unread,
            has_list_unsubscribe,
            id: self.id,
        })
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: Vec<Participant>,
    subject: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Clone)]
pub struct NylasClient {
    client: Client,
    api_url: String,
    api_key: String,
    backoff: ExponentialBackoff,
}

impl NylasClient {
    pub fn new(config: &EmailProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            backoff: ExponentialBackoff::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn check_status(grant_id: &str, response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            StatusCode::NOT_FOUND => Err(ProviderError::GrantNotFound(grant_id.to_string())),
            _ => Err(ProviderError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn fetch_page(
        &self,
        grant_id: &str,
        received_after: Option<DateTime<Utc>>,
        page_token: Option<&str>,
        limit: u32,
    ) -> Result<MessagePage, ProviderError> {
        let url = format!("{}/v3/grants/{}/messages", self.api_url, grant_id);
        let mut query: Vec<(&str, String)> = vec![
            ("limit", limit.to_string()),
            ("fields", "include_headers".to_string()),
        ];
        if let Some(after) = received_after {
            query.push(("received_after", after.timestamp().to_string()));
        }
        if let Some(token) = page_token {
            query.push(("page_token", token.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;
        let response = Self::check_status(grant_id, response).await?;

        let envelope: Envelope<Vec<NylasMessage>> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let messages = envelope
            .data
            .into_iter()
            .map(NylasMessage::into_provider_message)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessagePage {
            messages,
            next_cursor: envelope.next_cursor.filter(|c| !c.is_empty()),
        })
    }

    async fn post_send(&self, grant_id: &str, message: &OutgoingMessage) -> Result<String, ProviderError> {
        let url = format!("{}/v3/grants/{}/messages/send", self.api_url, grant_id);
        let request = SendRequest {
            to: message
                .to
                .iter()
                .map(|email| Participant {
                    name: None,
                    email: email.clone(),
                })
                .collect(),
            subject: &message.subject,
            body: &message.body,
            reply_to_message_id: message.reply_to_message_id.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = Self::check_status(grant_id, response).await?;

        let envelope: Envelope<SentMessage> = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(envelope.data.id)
    }
}

#[async_trait]
impl EmailProvider for NylasClient {
    #[instrument(skip(self, page_token))]
    async fn list_messages(
        &self,
        grant_id: &str,
        received_after: Option<DateTime<Utc>>,
        page_token: Option<String>,
        limit: u32,
    ) -> Result<MessagePage, ProviderError> {
        let token = page_token.as_deref();
        self.backoff
            .retry(ProviderError::is_transient, || {
                self.fetch_page(grant_id, received_after, token, limit)
            })
            .await
    }

    #[instrument(skip(self, message), fields(recipients = message.to.len()))]
    async fn send_message(&self, grant_id: &str, message: OutgoingMessage) -> Result<String, ProviderError> {
        // Sending is not idempotent; only retry when the provider refused before accepting
        self.backoff
            .retry(
                |e: &ProviderError| matches!(e, ProviderError::RateLimited),
                || self.post_send(grant_id, &message),
            )
            .await
    }
}
