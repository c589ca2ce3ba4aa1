// Language-model seam: completion client, prompt builders and answer parsing

pub mod openai;

pub use openai::OpenAiClient;

use crate::errors::LlmError;
use crate::models::{CampaignCategory, EmailMessage, EmailThread, VoiceCampaign};
use async_trait::async_trait;

/// Longest message body included in a prompt, in characters
const MAX_BODY_CHARS: usize = 2_000;

/// Chat-style completion: a system instruction plus one user prompt
#[cfg_attr(any(test, feature = "test-doubles"), mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

pub const SUMMARY_SYSTEM: &str =
    "You summarize email threads for a busy professional. Reply with at most three short sentences.";

pub const REPLY_SYSTEM: &str =
    "You draft concise, polite email replies. Reply with the email body only, without a subject line.";

pub const CATEGORY_SYSTEM: &str =
    "You classify outbound voice campaigns. Reply with exactly one category name from the list.";

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn transcript(messages: &[EmailMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let sender = match &m.from_name {
                Some(name) => format!("{} <{}>", name, m.from_email),
                None => m.from_email.clone(),
            };
            let text = m.body.as_deref().unwrap_or(&m.snippet);
            format!(
                "From: {}\nDate: {}\n\n{}",
                sender,
                m.received_at.format("%Y-%m-%d %H:%M UTC"),
                truncate(text, MAX_BODY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn summary_prompt(thread: &EmailThread, messages: &[EmailMessage]) -> String {
    format!(
        "Subject: {}\n\n{}\n\nSummarize this thread and list any action items.",
        thread.subject,
        transcript(messages)
    )
}

pub fn reply_prompt(thread: &EmailThread, messages: &[EmailMessage], instructions: Option<&str>) -> String {
    let mut prompt = format!(
        "Subject: {}\n\n{}\n\nWrite a reply to the latest message.",
        thread.subject,
        transcript(messages)
    );
    if let Some(instructions) = instructions.map(str::trim).filter(|i| !i.is_empty()) {
        prompt.push_str("\nInstructions: ");
        prompt.push_str(instructions);
    }
    prompt
}

pub fn category_prompt(campaign: &VoiceCampaign) -> String {
    let categories: Vec<&str> = CampaignCategory::ALL.iter().map(|c| c.as_str()).collect();
    format!(
        "Categories: {}\n\nCampaign name: {}\nDescription: {}\nGoal: {}\n\nWhich category fits best?",
        categories.join(", "),
        campaign.name,
        campaign.description.as_deref().unwrap_or("-"),
        campaign.goal.as_deref().unwrap_or("-"),
    )
}

/// Category mentioned earliest in `answer`, else `Other`
pub fn parse_category(answer: &str, allowed: &[CampaignCategory]) -> CampaignCategory {
    let answer = answer.to_lowercase();
    allowed
        .iter()
        .filter_map(|category| answer.find(category.as_str()).map(|pos| (pos, *category)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, category)| category)
        .unwrap_or(CampaignCategory::Other)
}
