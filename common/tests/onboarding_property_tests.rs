// Property-based tests for onboarding conditions, progress and task rules

use chrono::NaiveDate;
use common::models::{ConditionOperator, FieldCondition, TaskPriority, TaskRule, VisibilityRule};
use common::onboarding::{
    completion_percentage, draft_tasks, evaluate_condition, evaluate_rule, next_visible_step,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn responses(field: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    map
}

// not_equals is exactly the negation of equals.
#[test]
fn property_not_equals_negates_equals() {
    proptest!(|(answer in "[a-z]{0,6}", expected in "[a-z]{0,6}", present in any::<bool>())| {
        let answers = if present { responses("plan", json!(answer)) } else { Map::new() };
        let equals = FieldCondition {
            field: "plan".to_string(),
            operator: ConditionOperator::Equals,
            value: json!(expected),
        };
        let not_equals = FieldCondition {
            operator: ConditionOperator::NotEquals,
            ..equals.clone()
        };
        prop_assert_eq!(
            evaluate_condition(&equals, &answers),
            !evaluate_condition(&not_equals, &answers)
        );
    });
}

// Numbers compare by value against numeric strings.
#[test]
fn property_numbers_match_numeric_strings() {
    proptest!(|(n in -10_000i64..10_000)| {
        let condition = FieldCondition {
            field: "seats".to_string(),
            operator: ConditionOperator::Equals,
            value: json!(n.to_string()),
        };
        prop_assert!(evaluate_condition(&condition, &responses("seats", json!(n))));
    });
}

// An `any` rule holds when at least one of its conditions holds.
#[test]
fn property_any_rule_is_disjunction() {
    proptest!(|(
        selected in prop::collection::vec("[a-c]", 0..3),
        wanted in prop::collection::vec("[a-c]", 1..3),
    )| {
        let answers = responses("services", json!(selected));
        let conditions: Vec<FieldCondition> = wanted
            .iter()
            .map(|w| FieldCondition {
                field: "services".to_string(),
                operator: ConditionOperator::Includes,
                value: json!(w),
            })
            .collect();

        let expected = wanted.iter().any(|w| selected.contains(w));
        prop_assert_eq!(evaluate_rule(&VisibilityRule::Any { any: conditions }, &answers), expected);
    });
}

// Progress never exceeds 100 and never drops as the current step advances.
#[test]
fn property_completion_monotone() {
    proptest!(|(visible in prop::collection::btree_set(0usize..20, 0..10), step in 0usize..20)| {
        let visible: Vec<usize> = visible.into_iter().collect();
        let here = completion_percentage(&visible, step);
        let later = completion_percentage(&visible, step + 1);

        prop_assert!(here <= 100);
        prop_assert!(later >= here);
        prop_assert_eq!(completion_percentage(&visible, 20), 100);
    });
}

// The next step is a later visible step, or the end of the template.
#[test]
fn property_next_visible_step_moves_forward() {
    proptest!(|(visible in prop::collection::btree_set(0usize..12, 0..12), step in 0usize..12)| {
        let visible: Vec<usize> = visible.into_iter().collect();
        let next = next_visible_step(&visible, step, 12);

        prop_assert!(next > step);
        prop_assert!(next == 12 || visible.contains(&next));
        prop_assert!(!visible.iter().any(|&i| i > step && i < next));
    });
}

// Unconditional rules always produce a task due `due_in_days` from today.
#[test]
fn property_unconditional_rules_always_draft() {
    proptest!(|(days in prop::collection::vec(0i64..365, 0..8))| {
        let rules: Vec<TaskRule> = days
            .iter()
            .enumerate()
            .map(|(i, d)| TaskRule {
                title: format!("Task {}", i),
                description: None,
                priority: TaskPriority::Medium,
                due_in_days: *d,
                condition: None,
            })
            .collect();
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

        let drafts = draft_tasks(&rules, &Map::new(), today);
        prop_assert_eq!(drafts.len(), rules.len());
        for (draft, d) in drafts.iter().zip(&days) {
            prop_assert_eq!((draft.due_date - today).num_days(), *d);
        }
    });
}
