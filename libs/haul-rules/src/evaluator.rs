//! Rule evaluation against JSON subjects
//!
//! Subjects are plain `serde_json::Value` objects; a rule's controlled attribute is a dotted
//! path into them (`pmfm.id`, `model.measurementValues.90`). Comparisons are loose: numbers
//! and numeric strings compare by value, so `174` matches `"174"`.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{trace, warn};

use crate::types::{Rule, RuleOperator};

/// Failed rules: controlled attribute -> rule label -> message
pub type RuleErrors = BTreeMap<String, BTreeMap<String, String>>;

/// Evaluates rules against a subject
pub trait RuleEvaluator: Send + Sync {
    /// Whether `subject` satisfies the test of `rule` (its filter, or its operator)
    fn matches(&self, subject: &Value, rule: &Rule) -> bool;

    /// Errors of every failed rule, `None` when all pass
    ///
    /// A precondition rule that does not hold is skipped with its children; one that holds
    /// contributes the errors of its children. Structurally invalid rules are skipped.
    fn control(&self, subject: &Value, rules: &[Rule]) -> Option<RuleErrors> {
        let mut errors = RuleErrors::new();
        for rule in rules {
            self.control_rule(subject, rule, &mut errors);
        }
        (!errors.is_empty()).then_some(errors)
    }

    fn control_rule(&self, subject: &Value, rule: &Rule, errors: &mut RuleErrors) {
        if let Err(err) = rule.check() {
            warn!(rule = %rule.label, %err, "Skipping invalid rule");
            return;
        }

        let matched = self.matches(subject, rule);
        if rule.precondition {
            trace!(rule = %rule.label, matched, "precondition");
            if matched {
                for child in &rule.children {
                    self.control_rule(subject, child, errors);
                }
            }
            return;
        }

        if !matched {
            trace!(rule = %rule.label, message = %rule.message, "KO");
            errors
                .entry(rule.controlled_attribute.clone())
                .or_default()
                .insert(rule.label.clone(), rule.message.clone());
        }
    }

    fn valid(&self, subject: &Value, rules: &[Rule]) -> bool {
        self.control(subject, rules).is_none()
    }
}

/// Resolve a dotted path; numeric segments also index arrays
pub fn resolve_path<'a>(subject: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(subject);
    }
    path.split('.').try_fold(subject, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose equality between an attribute value and an expected literal
pub fn loose_eq(actual: &Value, expected: &str) -> bool {
    let expected_number = || expected.trim().parse::<f64>().ok();
    match actual {
        Value::String(s) if s == expected => true,
        Value::String(_) | Value::Number(_) => {
            matches!((as_number(actual), expected_number()), (Some(a), Some(b)) if a == b)
        },
        Value::Bool(b) => expected.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
        _ => false,
    }
}

/// Evaluator over dotted attribute paths
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeRuleEvaluator;

impl AttributeRuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn test_operator(&self, subject: &Value, rule: &Rule) -> bool {
        let actual = resolve_path(subject, &rule.controlled_attribute).filter(|v| !v.is_null());
        let expected = rule.expected();

        let equal = |actual: Option<&Value>| {
            actual.is_some_and(|a| expected.iter().any(|e| loose_eq(a, e)))
        };
        let any_in = |actual: Option<&Value>| match actual {
            Some(Value::Array(items)) => items.iter().any(|item| equal(Some(item))),
            other => equal(other),
        };
        let compare = |accept: fn(f64, f64) -> bool| {
            let left = actual.and_then(as_number);
            let right = expected.first().and_then(|e| e.trim().parse::<f64>().ok());
            matches!((left, right), (Some(l), Some(r)) if accept(l, r))
        };

        match rule.operator {
            RuleOperator::Equal => equal(actual),
            RuleOperator::NotEqual => !equal(actual),
            RuleOperator::In => any_in(actual),
            RuleOperator::NotIn => !any_in(actual),
            RuleOperator::Null => actual.is_none(),
            RuleOperator::NotNull => actual.is_some(),
            RuleOperator::LessThan => compare(|l, r| l < r),
            RuleOperator::LessOrEqual => compare(|l, r| l <= r),
            RuleOperator::GreaterThan => compare(|l, r| l > r),
            RuleOperator::GreaterOrEqual => compare(|l, r| l >= r),
        }
    }
}

impl RuleEvaluator for AttributeRuleEvaluator {
    fn matches(&self, subject: &Value, rule: &Rule) -> bool {
        match &rule.filter {
            Some(filter) => filter.test(subject),
            None => self.test_operator(subject, rule),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    fn rule(attribute: &str, operator: RuleOperator, value: &str) -> Rule {
        Rule::new("test", attribute, operator, value).with_message("failed")
    }

    #[test]
    fn test_resolve_path() {
        let subject = json!({"pmfm": {"id": 174, "values": [1, 2]}});
        assert_eq!(resolve_path(&subject, "pmfm.id"), Some(&json!(174)));
        assert_eq!(resolve_path(&subject, "pmfm.values.1"), Some(&json!(2)));
        assert_eq!(resolve_path(&subject, "pmfm.missing.id"), None);
    }

    #[test]
    fn test_loose_equality() {
        let evaluator = AttributeRuleEvaluator::new();
        let subject = json!({"pmfm": {"id": 174}});
        assert!(evaluator.matches(&subject, &rule("pmfm.id", RuleOperator::Equal, "174")));
        assert!(!evaluator.matches(&subject, &rule("pmfm.id", RuleOperator::NotEqual, "174")));
        assert!(evaluator.matches(&subject, &rule("pmfm.id", RuleOperator::NotEqual, "418")));

        let text = json!({"pmfm": {"id": "174.0"}});
        assert!(evaluator.matches(&text, &rule("pmfm.id", RuleOperator::Equal, "174")));
    }

    #[test]
    fn test_in_and_null_operators() {
        let evaluator = AttributeRuleEvaluator::new();
        let subject = json!({"tags": ["a", "b"], "empty": null});

        let in_rule = rule("tags", RuleOperator::In, "x").with_values(vec!["b".into(), "c".into()]);
        assert!(evaluator.matches(&subject, &in_rule));
        assert!(!evaluator.matches(&subject, &in_rule.not()));

        assert!(evaluator.matches(&subject, &rule("empty", RuleOperator::Null, "")));
        assert!(evaluator.matches(&subject, &rule("missing", RuleOperator::Null, "")));
        assert!(evaluator.matches(&subject, &rule("tags", RuleOperator::NotNull, "")));
    }

    #[test]
    fn test_numeric_comparisons() {
        let evaluator = AttributeRuleEvaluator::new();
        let subject = json!({"weight": "12.5"});
        assert!(evaluator.matches(&subject, &rule("weight", RuleOperator::GreaterThan, "10")));
        assert!(evaluator.matches(&subject, &rule("weight", RuleOperator::LessOrEqual, "12.5")));
        assert!(!evaluator.matches(&subject, &rule("weight", RuleOperator::LessThan, "abc")));
    }

    #[test]
    fn test_control_with_precondition() {
        let evaluator = AttributeRuleEvaluator::new();
        let rules = vec![Rule::precondition(
            "landing",
            |s| s["model"]["branch"] == "LAN",
            vec![rule("pmfm.id", RuleOperator::NotEqual, "176")],
        )];

        let landing = json!({"model": {"branch": "LAN"}, "pmfm": {"id": 176}});
        let errors = evaluator.control(&landing, &rules).unwrap();
        assert_eq!(errors["pmfm.id"]["test"], "failed");

        let discard = json!({"model": {"branch": "DIS"}, "pmfm": {"id": 176}});
        assert!(evaluator.valid(&discard, &rules));
    }

    #[test]
    #[traced_test]
    fn test_invalid_rules_are_skipped() {
        let evaluator = AttributeRuleEvaluator::new();
        let invalid = Rule::new("no-message", "pmfm.id", RuleOperator::Equal, "1");
        assert!(evaluator.valid(&json!({"pmfm": {"id": 2}}), &[invalid]));
        assert!(logs_contain("Skipping invalid rule"));
    }
}
