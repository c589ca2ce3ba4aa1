// Property-based tests for slugs, usage limits, webhook signatures and retry backoff

use common::billing::{plan_limit, UsageCheck};
use common::models::{PlanTier, UsageMetric};
use common::organizations::{slugify, unique_slug};
use common::retry::ExponentialBackoff;
use common::webhook::{sign, verify_signature};
use proptest::prelude::*;

// Slugs are lowercase ASCII alphanumerics joined by single dashes.
#[test]
fn property_slug_shape() {
    proptest!(|(name in "\\PC{0,40}")| {
        let slug = slugify(&name);
        prop_assert!(!slug.is_empty());
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
    });
}

// The chosen slug is never one already taken.
#[test]
fn property_unique_slug_avoids_taken() {
    proptest!(|(base in "[a-z]{1,10}", taken_suffixes in prop::collection::btree_set(1u32..10, 0..9))| {
        let mut taken: Vec<String> = taken_suffixes
            .iter()
            .map(|n| if *n == 1 { base.clone() } else { format!("{}-{}", base, n) })
            .collect();
        taken.sort();

        let slug = unique_slug(&base, &taken);
        prop_assert!(!taken.contains(&slug));
        prop_assert!(slug.starts_with(&base));
    });
}

// Usage is allowed exactly while it stays within the plan's limit.
#[test]
fn property_usage_check_respects_limit() {
    let plans = PlanTier::ALL.to_vec();
    let metrics = UsageMetric::ALL.to_vec();
    proptest!(|(
        plan in prop::sample::select(plans.clone()),
        metric in prop::sample::select(metrics.clone()),
        used in 0i64..200_000,
        additional in 0i64..1_000,
    )| {
        let limit = plan_limit(plan, metric);
        let check = UsageCheck::evaluate(metric, used, limit, additional);

        match limit {
            None => {
                prop_assert!(check.allowed);
                prop_assert!(check.remaining.is_none());
            }
            Some(limit) => {
                prop_assert_eq!(check.allowed, used + additional <= limit);
                prop_assert!(check.remaining.unwrap() >= 0);
            }
        }
    });
}

// Signatures verify for the signed body and fail for any other body.
#[test]
fn property_webhook_signature_round_trip() {
    proptest!(|(
        body in prop::collection::vec(any::<u8>(), 0..256),
        other in prop::collection::vec(any::<u8>(), 0..256),
        secret in "[a-zA-Z0-9]{8,32}",
    )| {
        let signature = sign(&body, &secret).unwrap();
        prop_assert!(verify_signature(&body, Some(&signature), &secret).is_ok());

        prop_assume!(body != other);
        prop_assert!(verify_signature(&other, Some(&signature), &secret).is_err());
    });
}

// Backoff delays stay under the cap plus jitter and stop after the last attempt.
#[test]
fn property_backoff_bounded() {
    proptest!(|(max_attempts in 1u32..8, base in 1u64..1_000, cap in 1_000u64..20_000)| {
        let backoff = ExponentialBackoff::with_config(max_attempts, base, cap, 0.1);
        for attempt in 0..max_attempts {
            match backoff.next_delay(attempt) {
                Some(delay) => {
                    prop_assert!(attempt + 1 < max_attempts);
                    prop_assert!(delay.as_millis() as u64 <= cap + cap / 10);
                }
                None => prop_assert_eq!(attempt + 1, max_attempts),
            }
        }
    });
}
