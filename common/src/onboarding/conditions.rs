// Visibility rule evaluation against the session's response blob

use crate::models::{ConditionOperator, FieldCondition, VisibilityRule};
use serde_json::{Map, Value};

/// Loose equality between a stored response and a rule value
///
/// Numbers match numeric strings by value and booleans match "true"/"false".
pub fn values_equal(response: &Value, expected: &Value) -> bool {
    match (response, expected) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (n.as_f64(), s.trim().parse::<f64>()) {
                (Some(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            match s.as_str() {
                "true" => *b,
                "false" => !*b,
                _ => false,
            }
        }
        _ => response == expected,
    }
}

pub fn evaluate_condition(condition: &FieldCondition, responses: &Map<String, Value>) -> bool {
    let response = responses.get(&condition.field);

    match condition.operator {
        ConditionOperator::Equals => response.is_some_and(|r| values_equal(r, &condition.value)),
        ConditionOperator::NotEquals => {
            !response.is_some_and(|r| values_equal(r, &condition.value))
        }
        ConditionOperator::Includes => match response {
            Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, &condition.value)),
            Some(Value::String(text)) => match &condition.value {
                Value::String(needle) => text.contains(needle.as_str()),
                _ => false,
            },
            _ => false,
        },
    }
}

pub fn evaluate_rule(rule: &VisibilityRule, responses: &Map<String, Value>) -> bool {
    match rule {
        VisibilityRule::Single(condition) => evaluate_condition(condition, responses),
        VisibilityRule::Any { any } => any.iter().any(|c| evaluate_condition(c, responses)),
    }
}

/// Elements without a rule are always shown
pub fn is_visible(rule: Option<&VisibilityRule>, responses: &Map<String, Value>) -> bool {
    rule.map_or(true, |r| evaluate_rule(r, responses))
}
