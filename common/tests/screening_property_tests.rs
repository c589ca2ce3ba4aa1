// Property-based tests for sender screening

use common::models::{Placement, ScreeningBucket};
use common::screening::{classify, local_part, normalize_sender, resolve_placement, SenderProfile};
use proptest::prelude::*;

fn arb_bucket() -> impl Strategy<Value = ScreeningBucket> {
    prop::sample::select(ScreeningBucket::ALL.to_vec())
}

fn arb_profile() -> impl Strategy<Value = SenderProfile> {
    (
        "[a-z]{1,10}(\\+[a-z]{1,5})?@[a-z]{2,8}\\.(com|io|net)",
        proptest::option::of("[A-Za-z ]{1,20}"),
        "[A-Za-z0-9 %!]{0,60}",
        "[A-Za-z0-9 %!]{0,200}",
        any::<bool>(),
    )
        .prop_map(|(email, display_name, subject, body, has_list_unsubscribe)| SenderProfile {
            email,
            display_name,
            subject,
            body,
            has_list_unsubscribe,
            is_known_contact: false,
        })
}

// Heuristics may pre-file mail but never block a sender.
#[test]
fn property_heuristics_never_block() {
    proptest!(|(profile in arb_profile())| {
        let classification = classify(&profile);
        prop_assert_ne!(classification.bucket, Some(ScreeningBucket::Blocked));
        prop_assert!((0.0..=1.0).contains(&classification.confidence));
        if classification.bucket.is_none() {
            prop_assert_eq!(classification.confidence, 0.0);
        }
    });
}

// Known contacts always go straight to the Imbox.
#[test]
fn property_known_contacts_land_in_imbox() {
    proptest!(|(mut profile in arb_profile())| {
        profile.is_known_contact = true;
        prop_assert_eq!(classify(&profile).bucket, Some(ScreeningBucket::Imbox));
    });
}

// A list-unsubscribe header alone is enough to file into the Feed.
#[test]
fn property_list_unsubscribe_files_to_feed() {
    proptest!(|(local in "[a-z]{3,8}", domain in "[a-z]{3,8}")| {
        let filed_locals = [
            "noreply", "donotreply", "notifications", "notification", "receipts",
            "billing", "invoices", "orders", "support", "alerts",
        ];
        prop_assume!(!filed_locals.contains(&local.as_str()));
        let profile = SenderProfile {
            email: format!("{}@{}.com", local, domain),
            subject: "Weekly digest".to_string(),
            has_list_unsubscribe: true,
            ..SenderProfile::default()
        };
        prop_assert_eq!(classify(&profile).bucket, Some(ScreeningBucket::Feed));
    });
}

// A stored decision always wins over the heuristic; with neither, mail waits in the Screener.
#[test]
fn property_decision_wins_over_heuristic() {
    proptest!(|(decision in proptest::option::of(arb_bucket()), profile in arb_profile())| {
        let classification = classify(&profile);
        let (placement, auto) = resolve_placement(decision, &classification);

        match (decision, classification.bucket) {
            (Some(bucket), _) => {
                prop_assert_eq!(placement, Placement::from(bucket));
                prop_assert!(!auto);
            }
            (None, Some(bucket)) => {
                prop_assert_eq!(placement, Placement::from(bucket));
                prop_assert!(auto);
            }
            (None, None) => {
                prop_assert_eq!(placement, Placement::Screener);
                prop_assert!(!auto);
            }
        }
    });
}

// Sender keys ignore case and surrounding whitespace; local parts drop +tags.
#[test]
fn property_sender_normalization() {
    proptest!(|(local in "[a-zA-Z]{1,10}", tag in "[a-z]{1,5}", domain in "[a-zA-Z]{2,8}")| {
        let email = format!("  {}+{}@{}.COM ", local, tag, domain);
        let normalized = normalize_sender(&email);

        prop_assert_eq!(normalized.clone(), normalized.to_ascii_lowercase());
        prop_assert_eq!(normalized.trim(), normalized.as_str());
        prop_assert_eq!(local_part(&email), local.to_ascii_lowercase());
    });
}
