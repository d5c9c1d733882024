//! Rule type definitions
//!
//! A [`Rule`] tests one attribute of a subject (usually a PMFM, addressed as `pmfm.id`)
//! against an expected value. A precondition rule gates its children: they only apply when
//! the precondition holds.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuleOperator {
    #[default]
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "NOT NULL")]
    NotNull,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl RuleOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Null => "NULL",
            Self::NotNull => "NOT NULL",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        }
    }

    /// Operator accepting exactly what this one rejects
    pub fn inverse(&self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::In => Self::NotIn,
            Self::NotIn => Self::In,
            Self::Null => Self::NotNull,
            Self::NotNull => Self::Null,
            Self::LessThan => Self::GreaterOrEqual,
            Self::GreaterOrEqual => Self::LessThan,
            Self::GreaterThan => Self::LessOrEqual,
            Self::LessOrEqual => Self::GreaterThan,
        }
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleOperator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            "NULL" => Ok(Self::Null),
            "NOT NULL" => Ok(Self::NotNull),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessOrEqual),
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterOrEqual),
            other => Err(RuleError::UnsupportedOperator(other.to_string())),
        }
    }
}

/// Inverse of an operator given by its symbol
pub fn inverse_operator(operator: &str) -> Result<RuleOperator> {
    Ok(operator.parse::<RuleOperator>()?.inverse())
}

// ============================================================================
// Rule
// ============================================================================

/// In-process predicate replacing the operator test
#[derive(Clone)]
pub struct RuleFilter(Arc<dyn Fn(&serde_json::Value) -> bool + Send + Sync>);

impl RuleFilter {
    pub fn new(filter: impl Fn(&serde_json::Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(filter))
    }

    pub fn test(&self, subject: &serde_json::Value) -> bool {
        (self.0)(subject)
    }
}

impl fmt::Debug for RuleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RuleFilter(..)")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rule {
    pub label: String,

    /// Dotted attribute path, e.g. `pmfm.id`
    #[serde(alias = "name")]
    pub controlled_attribute: String,

    pub operator: RuleOperator,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,

    pub message: String,

    pub precondition: bool,

    pub blocking: bool,

    pub bidirectional: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Rule>,

    #[serde(skip)]
    pub filter: Option<RuleFilter>,
}

impl Rule {
    pub fn new(
        label: impl Into<String>,
        controlled_attribute: impl Into<String>,
        operator: RuleOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            controlled_attribute: controlled_attribute.into(),
            operator,
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// A rule applying `children` only where `filter` holds
    pub fn precondition(
        label: impl Into<String>,
        filter: impl Fn(&serde_json::Value) -> bool + Send + Sync + 'static,
        children: Vec<Rule>,
    ) -> Self {
        Self {
            label: label.into(),
            precondition: true,
            filter: Some(RuleFilter::new(filter)),
            children,
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.value = None;
        self.values = Some(values);
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&serde_json::Value) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(RuleFilter::new(filter));
        self
    }

    pub fn from_object(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Structural validity
    pub fn check(&self) -> Result<()> {
        if self.precondition {
            if self.children.is_empty() {
                return Err(RuleError::invalid_rule("precondition without children rules"));
            }
        } else if self.label.trim().is_empty() || self.message.trim().is_empty() {
            return Err(RuleError::invalid_rule("'label' and 'message' are required"));
        }
        if self.filter.is_none() && self.controlled_attribute.trim().is_empty() {
            return Err(RuleError::invalid_rule(format!(
                "rule '{}' requires a controlled attribute or a filter",
                self.label
            )));
        }
        Ok(())
    }

    /// Negated copy: operator inverted, or filter wrapped
    pub fn not(&self) -> Rule {
        let mut target = self.clone();
        match self.filter.clone() {
            Some(filter) => {
                target.filter = Some(RuleFilter::new(move |subject| !filter.test(subject)));
            },
            None => target.operator = self.operator.inverse(),
        }
        target
    }

    /// Expected values: `values` when given, otherwise the single `value`
    pub fn expected(&self) -> Vec<&str> {
        match (&self.values, &self.value) {
            (Some(values), _) => values.iter().map(String::as_str).collect(),
            (None, Some(value)) => vec![value.as_str()],
            (None, None) => Vec::new(),
        }
    }
}

/// Negate every rule
pub fn not_all(rules: &[Rule]) -> Vec<Rule> {
    rules.iter().map(Rule::not).collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_symbols() {
        let op: RuleOperator = "not in".parse().unwrap();
        assert_eq!(op, RuleOperator::NotIn);
        assert_eq!(serde_json::to_value(RuleOperator::GreaterOrEqual).unwrap(), json!(">="));
        assert!(matches!(
            "BETWEEN".parse::<RuleOperator>(),
            Err(RuleError::UnsupportedOperator(op)) if op == "BETWEEN"
        ));
    }

    #[test]
    fn test_inverse_operator() {
        assert_eq!(inverse_operator("=").unwrap(), RuleOperator::NotEqual);
        assert_eq!(inverse_operator("<").unwrap(), RuleOperator::GreaterOrEqual);
        assert_eq!(inverse_operator("NULL").unwrap(), RuleOperator::NotNull);
        for op in [
            RuleOperator::Equal,
            RuleOperator::In,
            RuleOperator::LessOrEqual,
            RuleOperator::GreaterThan,
        ] {
            assert_eq!(op.inverse().inverse(), op);
        }
    }

    #[test]
    fn test_from_object_accepts_name_alias() {
        let rule = Rule::from_object(json!({
            "label": "no-size",
            "name": "pmfm.id",
            "operator": "!=",
            "value": "174",
            "message": "not allowed"
        }))
        .unwrap();
        assert_eq!(rule.controlled_attribute, "pmfm.id");
        assert_eq!(rule.operator, RuleOperator::NotEqual);
        assert!(rule.check().is_ok());
        assert_eq!(rule.expected(), vec!["174"]);
    }

    #[test]
    fn test_check() {
        let missing_message = Rule::new("a", "pmfm.id", RuleOperator::Equal, "1");
        assert!(missing_message.check().is_err());

        let empty_precondition = Rule::precondition("pre", |_| true, Vec::new());
        assert!(matches!(empty_precondition.check(), Err(RuleError::InvalidRule(_))));

        let ok = Rule::precondition("pre", |_| true, vec![missing_message.with_message("m")]);
        assert!(ok.check().is_ok());
    }

    #[test]
    fn test_not() {
        let rule = Rule::new("a", "pmfm.id", RuleOperator::In, "1").with_message("m");
        assert_eq!(rule.not().operator, RuleOperator::NotIn);

        let filtered = rule.with_filter(|v| v.is_null());
        let negated = filtered.not();
        assert_eq!(negated.operator, RuleOperator::In);
        assert!(!negated.filter.unwrap().test(&serde_json::Value::Null));
    }
}
