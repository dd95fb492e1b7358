//! Rule and rule-set trees, and their mirrored result trees

use caseflow_core::Value;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// A leaf rule: one operator applied to one extracted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Dotted path into the evaluation data
    pub key: String,
    /// Operator name, resolved against the engine's fixed catalog
    pub operator: String,
    /// Comparison value; for path comparisons this is a second dotted path
    pub value: Value,
    /// When set, `value` is read as a path into the data and the two
    /// resolved values are compared
    #[serde(default)]
    pub is_path_comparison: bool,
    /// Extra parameter read only by threshold-aware operators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// Boolean combinator for a rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetOperator {
    And,
    Or,
}

/// A recursive tree of rules combined with AND/OR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub operator: SetOperator,
    pub rules: Vec<RuleOrSet>,
}

/// A node of a rule tree: either a nested set or a leaf rule
///
/// Nested sets carry a `rules` array, leaves carry a `key`, so the untagged
/// representation is unambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleOrSet {
    Set(RuleSet),
    Rule(Rule),
}

/// Outcome of one rule or rule-set evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result for one leaf rule
///
/// Only leaf rules can resolve to FAILED; nested sets fold to PASSED or
/// SKIPPED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub status: RuleStatus,
    /// The evaluated rule, echoed back for host-side reporting
    pub rule: Rule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleResult {
    /// A passed result
    pub fn passed(rule: &Rule) -> Self {
        Self {
            status: RuleStatus::Passed,
            rule: rule.clone(),
            message: None,
            error: None,
        }
    }

    /// A failed result without an evaluation error (the rule simply did not
    /// hold)
    pub fn failed(rule: &Rule) -> Self {
        Self {
            status: RuleStatus::Failed,
            rule: rule.clone(),
            message: None,
            error: None,
        }
    }

    /// A failed result caused by an evaluation error
    pub fn failed_with_error(rule: &Rule, error: &RuleError) -> Self {
        Self {
            status: RuleStatus::Failed,
            rule: rule.clone(),
            message: Some(error.to_string()),
            error: Some(error.kind().to_string()),
        }
    }
}

/// Result for one rule set, mirroring the set's structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetResult {
    pub status: RuleStatus,
    pub operator: SetOperator,
    pub results: Vec<RuleResultNode>,
}

/// A node of a result tree, mirroring `RuleOrSet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleResultNode {
    Set(RuleSetResult),
    Rule(RuleResult),
}

impl RuleResultNode {
    /// Folded status of this node
    pub fn status(&self) -> RuleStatus {
        match self {
            RuleResultNode::Set(set) => set.status,
            RuleResultNode::Rule(rule) => rule.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_set_deserialization() {
        let rule_set: RuleSet = serde_json::from_value(json!({
            "operator": "AND",
            "rules": [
                { "key": "age", "operator": "GTE", "value": 18 },
                {
                    "operator": "OR",
                    "rules": [
                        { "key": "country", "operator": "EQUALS", "value": "GB" },
                        { "key": "country", "operator": "EQUALS", "value": "DE" }
                    ]
                }
            ]
        }))
        .unwrap();

        assert_eq!(rule_set.operator, SetOperator::And);
        assert_eq!(rule_set.rules.len(), 2);
        assert!(matches!(rule_set.rules[0], RuleOrSet::Rule(_)));
        assert!(matches!(rule_set.rules[1], RuleOrSet::Set(_)));
    }

    #[test]
    fn test_rule_defaults() {
        let rule: Rule = serde_json::from_value(json!({
            "key": "name",
            "operator": "EQUALS",
            "value": "Acme"
        }))
        .unwrap();

        assert!(!rule.is_path_comparison);
        assert_eq!(rule.threshold, None);
    }
}
