// Thread importance scoring: weighted sender, keyword, engagement and deadline signals

use crate::models::ImportanceLevel;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;

const SENDER_WEIGHT: f64 = 0.35;
const KEYWORD_WEIGHT: f64 = 0.25;
const ENGAGEMENT_WEIGHT: f64 = 0.20;
const DEADLINE_WEIGHT: f64 = 0.20;

const KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "important",
    "contract",
    "proposal",
    "invoice",
    "meeting",
    "action required",
    "follow up",
    "decision",
];

const DEADLINE_PHRASES: &[&str] = &[
    "deadline",
    "due date",
    "due by",
    "by eod",
    "end of day",
    "expires",
    "expiring",
    "tomorrow",
    "today",
    "by friday",
];

/// What the scorer needs to know about a thread
#[derive(Debug, Clone)]
pub struct ThreadSignals {
    pub participants: Vec<String>,
    pub subject: String,
    pub snippets: Vec<String>,
    pub message_count: usize,
    pub last_message_at: DateTime<Utc>,
}

/// Org-wide context: VIP domains and known contact addresses, all lowercase
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    pub vip_domains: HashSet<String>,
    pub known_contacts: HashSet<String>,
}

impl ScoringContext {
    /// VIP set = configured domains ∪ domains of the org's contacts
    pub fn new<'a>(
        configured_domains: &[String],
        contact_emails: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut vip_domains: HashSet<String> = configured_domains
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        let mut known_contacts = HashSet::new();

        for email in contact_emails {
            let email = email.trim().to_ascii_lowercase();
            if let Some(domain) = domain_of(&email) {
                vip_domains.insert(domain.to_string());
            }
            known_contacts.insert(email);
        }

        Self {
            vip_domains,
            known_contacts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImportanceScore {
    pub total: u8,
    pub level: ImportanceLevel,
    pub sender: f64,
    pub keywords: f64,
    pub engagement: f64,
    pub deadline: f64,
}

fn domain_of(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, d)| d).filter(|d| !d.is_empty())
}

fn count_hits(text: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|p| text.contains(*p)).count()
}

pub fn level_for(total: u8) -> ImportanceLevel {
    match total {
        70.. => ImportanceLevel::High,
        40..=69 => ImportanceLevel::Medium,
        _ => ImportanceLevel::Low,
    }
}

pub fn score_thread(
    thread: &ThreadSignals,
    context: &ScoringContext,
    now: DateTime<Utc>,
) -> ImportanceScore {
    let participants: Vec<String> = thread
        .participants
        .iter()
        .map(|p| p.trim().to_ascii_lowercase())
        .collect();

    let sender = if participants
        .iter()
        .filter_map(|p| domain_of(p))
        .any(|d| context.vip_domains.contains(d))
    {
        100.0
    } else if participants
        .iter()
        .any(|p| context.known_contacts.contains(p))
    {
        60.0
    } else {
        0.0
    };

    let text = std::iter::once(thread.subject.as_str())
        .chain(thread.snippets.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let keywords = (count_hits(&text, KEYWORDS) as f64 * 25.0).min(100.0);

    let age = now - thread.last_message_at;
    let recency = if age <= Duration::hours(24) {
        40.0
    } else if age <= Duration::hours(72) {
        20.0
    } else if age <= Duration::days(7) {
        10.0
    } else {
        0.0
    };
    let engagement = (thread.message_count.min(5) as f64 * 12.0 + recency).min(100.0);

    let deadline = match count_hits(&text, DEADLINE_PHRASES) {
        0 => 0.0,
        1 => 70.0,
        _ => 100.0,
    };

    let weighted = sender * SENDER_WEIGHT
        + keywords * KEYWORD_WEIGHT
        + engagement * ENGAGEMENT_WEIGHT
        + deadline * DEADLINE_WEIGHT;
    let total = weighted.round().clamp(0.0, 100.0) as u8;

    ImportanceScore {
        total,
        level: level_for(total),
        sender,
        keywords,
        engagement,
        deadline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(subject: &str, count: usize, hours_ago: i64, now: DateTime<Utc>) -> ThreadSignals {
        ThreadSignals {
            participants: vec!["ceo@bigclient.com".to_string(), "me@tenantry.io".to_string()],
            subject: subject.to_string(),
            snippets: vec![],
            message_count: count,
            last_message_at: now - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn test_vip_urgent_thread_is_high() {
        let now = Utc::now();
        let ctx = ScoringContext::new(&["bigclient.com".to_string()], std::iter::empty());
        let score = score_thread(&thread("URGENT: contract due by Friday", 3, 2, now), &ctx, now);
        assert_eq!(score.sender, 100.0);
        assert_eq!(score.keywords, 50.0);
        assert_eq!(score.engagement, 76.0);
        assert_eq!(score.deadline, 100.0);
        // 35 + 12.5 + 15.2 + 20 = 82.7
        assert_eq!(score.total, 83);
        assert_eq!(score.level, ImportanceLevel::High);
    }

    #[test]
    fn test_contact_domain_counts_as_vip() {
        let now = Utc::now();
        let ctx = ScoringContext::new(&[], ["Someone@BigClient.com"]);
        let score = score_thread(&thread("hello", 1, 200, now), &ctx, now);
        assert_eq!(score.sender, 100.0);
    }

    #[test]
    fn test_stale_unknown_thread_is_low() {
        let now = Utc::now();
        let score = score_thread(&thread("hello", 1, 24 * 30, now), &ScoringContext::default(), now);
        assert_eq!(score.sender, 0.0);
        assert_eq!(score.engagement, 12.0);
        assert_eq!(score.total, 2);
        assert_eq!(score.level, ImportanceLevel::Low);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level_for(70), ImportanceLevel::High);
        assert_eq!(level_for(69), ImportanceLevel::Medium);
        assert_eq!(level_for(40), ImportanceLevel::Medium);
        assert_eq!(level_for(39), ImportanceLevel::Low);
    }
}
