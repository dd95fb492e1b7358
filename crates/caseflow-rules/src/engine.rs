//! Rule engine entry points
//!
//! `validate_rule` evaluates one leaf rule, `run` evaluates a whole tree.
//! Both are total: any failure during a leaf evaluation becomes a FAILED
//! result carrying the error, and the result tree's length and nesting match
//! the input tree at every level.

use crate::error::RuleError;
use crate::helpers::Helpers;
use crate::operators::{build_catalog, EvalOptions, Operator};
use crate::types::{
    Rule, RuleOrSet, RuleResult, RuleResultNode, RuleSet, RuleSetResult, RuleStatus, SetOperator,
};
use caseflow_core::Value;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;

/// Nested rule evaluation engine with a fixed operator catalog
pub struct RuleEngine {
    operators: HashMap<&'static str, Arc<dyn Operator>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            operators: build_catalog(),
        }
    }

    /// Evaluate one leaf rule against `data`. Never errors; every failure
    /// mode is folded into the returned result.
    pub async fn validate_rule(&self, rule: &Rule, data: &Value, helpers: &Helpers) -> RuleResult {
        match self.try_validate(rule, data, helpers).await {
            Ok(true) => RuleResult::passed(rule),
            Ok(false) => RuleResult::failed(rule),
            Err(error) => {
                tracing::debug!(
                    operator = %rule.operator,
                    key = %rule.key,
                    %error,
                    "rule evaluation failed"
                );
                RuleResult::failed_with_error(rule, &error)
            }
        }
    }

    /// Evaluate a rule tree against `data`, returning a structurally
    /// mirrored result tree.
    ///
    /// Folding: an AND set is PASSED iff every child is PASSED, an OR set is
    /// PASSED iff any child is PASSED; otherwise the set is SKIPPED. Only
    /// leaf rules can resolve to FAILED.
    pub async fn run(&self, rule_set: &RuleSet, data: &Value, helpers: &Helpers) -> RuleSetResult {
        self.run_inner(rule_set, data, helpers).await
    }

    fn run_inner<'a>(
        &'a self,
        rule_set: &'a RuleSet,
        data: &'a Value,
        helpers: &'a Helpers,
    ) -> BoxFuture<'a, RuleSetResult> {
        async move {
            let mut results = Vec::with_capacity(rule_set.rules.len());

            for node in &rule_set.rules {
                let result = match node {
                    RuleOrSet::Set(nested) => {
                        RuleResultNode::Set(self.run_inner(nested, data, helpers).await)
                    }
                    RuleOrSet::Rule(rule) => {
                        RuleResultNode::Rule(self.validate_rule(rule, data, helpers).await)
                    }
                };
                results.push(result);
            }

            let passed = match rule_set.operator {
                SetOperator::And => results.iter().all(|r| r.status() == RuleStatus::Passed),
                SetOperator::Or => results.iter().any(|r| r.status() == RuleStatus::Passed),
            };

            RuleSetResult {
                status: if passed {
                    RuleStatus::Passed
                } else {
                    RuleStatus::Skipped
                },
                operator: rule_set.operator,
                results,
            }
        }
        .boxed()
    }

    async fn try_validate(
        &self,
        rule: &Rule,
        data: &Value,
        helpers: &Helpers,
    ) -> Result<bool, RuleError> {
        let operator = self
            .operators
            .get(rule.operator.as_str())
            .ok_or_else(|| RuleError::OperatorNotFound(rule.operator.clone()))?;

        let operands = operator.extract(data, rule)?;
        let options = EvalOptions {
            helpers,
            threshold: if operator.threshold_aware() {
                rule.threshold
            } else {
                None
            },
        };

        operator.evaluate(&operands, &options).await
    }
}
