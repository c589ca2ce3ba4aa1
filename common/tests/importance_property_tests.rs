// Property-based tests for thread importance scoring

use chrono::{Duration, TimeZone, Utc};
use common::importance::{level_for, score_thread, ScoringContext, ThreadSignals};
use common::models::ImportanceLevel;
use proptest::prelude::*;

fn arb_thread() -> impl Strategy<Value = (ThreadSignals, i64)> {
    (
        prop::collection::vec("[a-z]{2,8}@[a-z]{2,8}\\.com", 1..5),
        "[A-Za-z ]{0,60}",
        prop::collection::vec("[A-Za-z ]{0,80}", 0..5),
        1usize..20,
        0i64..500,
    )
        .prop_map(|(participants, subject, snippets, message_count, hours_ago)| {
            let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
            (
                ThreadSignals {
                    participants,
                    subject,
                    snippets,
                    message_count,
                    last_message_at: now - Duration::hours(hours_ago),
                },
                hours_ago,
            )
        })
}

// Scores stay within 0..=100 and the level always matches the total.
#[test]
fn property_score_bounded_and_consistent() {
    proptest!(|((thread, _) in arb_thread())| {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let score = score_thread(&thread, &ScoringContext::default(), now);

        prop_assert!(score.total <= 100);
        prop_assert_eq!(score.level, level_for(score.total));
        for component in [score.sender, score.keywords, score.engagement, score.deadline] {
            prop_assert!((0.0..=100.0).contains(&component));
        }
    });
}

// Adding a participant's domain to the VIP list never lowers the score.
#[test]
fn property_vip_domain_never_lowers_score() {
    proptest!(|((thread, _) in arb_thread())| {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let plain = score_thread(&thread, &ScoringContext::default(), now);

        let domain = thread.participants[0].rsplit_once('@').unwrap().1.to_string();
        let vip = ScoringContext::new(&[domain], std::iter::empty());
        let boosted = score_thread(&thread, &vip, now);

        prop_assert!(boosted.total >= plain.total);
        prop_assert_eq!(boosted.sender, 100.0);
    });
}

// Levels partition the range at 40 and 70.
#[test]
fn property_level_thresholds() {
    proptest!(|(total in 0u8..=100)| {
        let expected = if total >= 70 {
            ImportanceLevel::High
        } else if total >= 40 {
            ImportanceLevel::Medium
        } else {
            ImportanceLevel::Low
        };
        prop_assert_eq!(level_for(total), expected);
    });
}
