// Email provider webhook verification (X-Nylas-Signature)

use crate::errors::WebhookError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-nylas-signature";

/// Check the hex HMAC-SHA256 of the raw body against the shared secret
pub fn verify_signature(
    payload: &[u8],
    signature: Option<&str>,
    secret: &str,
) -> Result<(), WebhookError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingSignature)?;

    let expected = hex::decode(signature).map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidPayload(format!("Invalid webhook secret: {}", e)))?;
    mac.update(payload);

    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Hex signature for `payload`, as the provider would send it
pub fn sign(payload: &[u8], secret: &str) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidPayload(format!("Invalid webhook secret: {}", e)))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Notification body: `{ "type": "message.created", "data": { "object": { "grant_id": .. } } }`
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: WebhookObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookObject {
    pub grant_id: Option<String>,
    pub id: Option<String>,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// New mail is waiting for the grant
    pub fn triggers_sync(&self) -> bool {
        self.event_type == "message.created"
    }

    pub fn grant_id(&self) -> Option<&str> {
        self.data.object.grant_id.as_deref()
    }
}
