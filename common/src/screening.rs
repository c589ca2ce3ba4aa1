// Sender screening: heuristic bucket classification and placement resolution
//
// A message lands in the Screener until its sender has a decision. Heuristics
// may pre-file obvious paper-trail or feed mail but never block anyone.

use crate::db::repositories::{ScreenerSender, ScreeningRepository};
use crate::errors::{ServiceError, ValidationError};
use crate::models::{Placement, ScreeningBucket, ScreeningDecision};
use crate::telemetry;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

/// Everything the classifier looks at for one incoming message
#[derive(Debug, Clone, Default)]
pub struct SenderProfile {
    pub email: String,
    pub display_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub has_list_unsubscribe: bool,
    pub is_known_contact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub bucket: Option<ScreeningBucket>,
    pub confidence: f64,
    pub signals: Vec<String>,
}

/// Minimum score a bucket needs before heuristics file the message
pub const SCORE_THRESHOLD: u32 = 3;

const NOREPLY_LOCAL_PARTS: &[&str] = &[
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
    "notifications",
    "notification",
    "receipts",
    "billing",
    "invoices",
    "orders",
    "support",
    "alerts",
];

const PAPER_TRAIL_PHRASES: &[&str] = &[
    "receipt",
    "invoice",
    "order confirmation",
    "your order",
    "payment received",
    "shipping confirmation",
    "has shipped",
    "password reset",
    "verification code",
    "statement is ready",
];

const FEED_PHRASES: &[(&str, u32)] = &[
    ("unsubscribe", 3),
    ("view in browser", 2),
    ("view this email in your browser", 2),
    ("newsletter", 2),
    ("% off", 2),
    ("limited time", 2),
    ("promo code", 2),
    ("flash sale", 2),
    ("free shipping", 2),
];

/// Lowercased local part of an address, without any `+tag`
pub fn local_part(email: &str) -> String {
    let local = email.rsplit_once('@').map(|(l, _)| l).unwrap_or(email);
    let local = local.split('+').next().unwrap_or(local);
    local.trim().to_ascii_lowercase()
}

/// Canonical key for sender decisions
pub fn normalize_sender(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn classify(profile: &SenderProfile) -> Classification {
    if profile.is_known_contact {
        return Classification {
            bucket: Some(ScreeningBucket::Imbox),
            confidence: 1.0,
            signals: vec!["known_contact".to_string()],
        };
    }

    let text = format!(
        "{} {} {}",
        profile.display_name.as_deref().unwrap_or_default(),
        profile.subject,
        profile.body
    )
    .to_lowercase();

    let mut signals = Vec::new();

    let mut paper_trail = 0;
    let local = local_part(&profile.email);
    if NOREPLY_LOCAL_PARTS.contains(&local.as_str()) {
        paper_trail += 3;
        signals.push(format!("sender:{}", local));
    }
    for phrase in PAPER_TRAIL_PHRASES {
        if text.contains(phrase) {
            paper_trail += 2;
            signals.push(format!("paper_trail:{}", phrase));
        }
    }

    let mut feed = 0;
    if profile.has_list_unsubscribe {
        feed += 3;
        signals.push("header:list-unsubscribe".to_string());
    }
    for (phrase, weight) in FEED_PHRASES {
        if text.contains(phrase) {
            feed += weight;
            signals.push(format!("feed:{}", phrase));
        }
    }

    let (bucket, score) = if paper_trail >= feed {
        (ScreeningBucket::PaperTrail, paper_trail)
    } else {
        (ScreeningBucket::Feed, feed)
    };

    if score < SCORE_THRESHOLD {
        return Classification {
            bucket: None,
            confidence: 0.0,
            signals,
        };
    }

    Classification {
        bucket: Some(bucket),
        confidence: (f64::from(score) / 6.0).min(1.0),
        signals,
    }
}

/// A stored decision wins, then the heuristic bucket, else the Screener
pub fn resolve_placement(
    decision: Option<ScreeningBucket>,
    classification: &Classification,
) -> (Placement, bool) {
    match (decision, classification.bucket) {
        (Some(bucket), _) => (bucket.into(), false),
        (None, Some(bucket)) => (bucket.into(), true),
        (None, None) => (Placement::Screener, false),
    }
}

/// Sender decisions and the re-filing of mail they cause
#[derive(Clone)]
pub struct ScreeningService {
    decisions: ScreeningRepository,
}

fn valid_sender(sender: &str) -> Result<String, ValidationError> {
    let sender = normalize_sender(sender);
    if sender.is_empty() || !sender.contains('@') {
        return Err(ValidationError::invalid("sender", "not an email address"));
    }
    Ok(sender)
}

impl ScreeningService {
    pub fn new(decisions: ScreeningRepository) -> Self {
        Self { decisions }
    }

    /// Store the decision and move the sender's existing mail; returns the decision and moved count
    #[instrument(skip(self))]
    pub async fn record_decision(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        sender: &str,
        bucket: ScreeningBucket,
    ) -> Result<(ScreeningDecision, u64), ServiceError> {
        let sender = valid_sender(sender)?;
        let decision = self.decisions.upsert_decision(org_id, user_id, &sender, bucket).await?;
        let moved = self.decisions.refile_sender(user_id, &sender, bucket.into()).await?;
        telemetry::record_screening_decision(bucket);
        Ok((decision, moved))
    }

    /// Forget the decision and send the sender's mail back to the Screener
    #[instrument(skip(self))]
    pub async fn clear_decision(&self, user_id: Uuid, sender: &str) -> Result<u64, ServiceError> {
        let sender = valid_sender(sender)?;
        if !self.decisions.delete_decision(user_id, &sender).await? {
            return Ok(0);
        }
        Ok(self.decisions.refile_sender(user_id, &sender, Placement::Screener).await?)
    }

    pub async fn list_decisions(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<ScreeningDecision>, ServiceError> {
        Ok(self.decisions.list_decisions(org_id, user_id).await?)
    }

    pub async fn screener_queue(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<ScreenerSender>, ServiceError> {
        Ok(self.decisions.screener_queue(org_id, user_id).await?)
    }
}
