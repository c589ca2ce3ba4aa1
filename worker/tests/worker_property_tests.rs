// Property-based tests for the scheduling rules the worker applies

use chrono::{Duration, TimeZone, Utc};
use common::email::sync::{dedup_batch, lock_resource};
use common::email::ProviderMessage;
use common::models::{ReminderChannel, ReminderStatus};
use common::reminders::{build_reminder, render_body, NewReminder};
use proptest::prelude::*;
use uuid::Uuid;

fn reminder_input(due_in_minutes: i64, before: i32) -> NewReminder {
    NewReminder {
        title: "Call Acme".to_string(),
        notes: None,
        entity_type: None,
        entity_id: None,
        due_at: Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(due_in_minutes),
        remind_before_minutes: before,
        channel: ReminderChannel::InApp,
    }
}

// A reminder fires `remind_before_minutes` ahead of its due time and starts pending.
#[test]
fn property_notify_at_precedes_due_time() {
    proptest!(|(due_in in 1i64..100_000, before in 0i32..10_000)| {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let reminder = build_reminder(Uuid::new_v4(), Uuid::new_v4(), reminder_input(due_in, before), now).unwrap();

        prop_assert_eq!(reminder.status, ReminderStatus::Pending);
        prop_assert_eq!(reminder.due_at - reminder.notify_at(), Duration::minutes(i64::from(before)));
        prop_assert!(reminder.notify_at() <= reminder.due_at);
    });
}

// Reminders due now or in the past are rejected.
#[test]
fn property_past_due_rejected() {
    proptest!(|(ago in 0i64..100_000)| {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let result = build_reminder(Uuid::new_v4(), Uuid::new_v4(), reminder_input(-ago, 0), now);
        prop_assert!(result.is_err());
    });
}

// The rendered body always leads with the title, whatever the timezone.
#[test]
fn property_body_names_reminder() {
    let zones = vec![chrono_tz::UTC, chrono_tz::Europe::Berlin, chrono_tz::Asia::Tokyo, chrono_tz::America::New_York];
    proptest!(|(tz in prop::sample::select(zones.clone()), due_in in 1i64..10_000)| {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
        let reminder = build_reminder(Uuid::new_v4(), Uuid::new_v4(), reminder_input(due_in, 0), now).unwrap();
        prop_assert!(render_body(&reminder, tz).starts_with("Call Acme is due "));
    });
}

// Each mailbox gets its own sync lock.
#[test]
fn property_lock_resource_is_per_mailbox() {
    proptest!(|(a in any::<u128>(), b in any::<u128>())| {
        let (a, b) = (Uuid::from_u128(a), Uuid::from_u128(b));
        prop_assert_eq!(lock_resource(a) == lock_resource(b), a == b);
    });
}

// Deduplication keeps one message per provider id and counts the rest.
#[test]
fn property_dedup_batch_counts_drops() {
    proptest!(|(ids in prop::collection::vec(0u8..8, 0..30))| {
        let messages: Vec<ProviderMessage> = ids
            .iter()
            .map(|id| ProviderMessage {
                id: format!("msg-{}", id),
                thread_id: "thread-1".to_string(),
                from_email: "ana@example.com".to_string(),
                from_name: None,
                to: vec!["me@example.com".to_string()],
                subject: "Hello".to_string(),
                snippet: String::new(),
                body: None,
                received_at: Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap(),
                unread: true,
                has_list_unsubscribe: false,
            })
            .collect();

        let (kept, dropped) = dedup_batch(messages);
        let unique: std::collections::HashSet<u8> = ids.iter().copied().collect();

        prop_assert_eq!(kept.len(), unique.len());
        prop_assert_eq!(kept.len() + dropped, ids.len());
    });
}
