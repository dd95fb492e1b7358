//! Integration tests for rule-set evaluation
//!
//! Exercises the engine end to end over realistic KYB-style data: nested
//! AND/OR folding, total evaluation over malformed rules, path comparisons,
//! and the fuzzy-match operator backed by an entity-matching helper.

use async_trait::async_trait;
use caseflow_core::Value;
use caseflow_rules::helpers::names;
use caseflow_rules::{
    Helpers, RuleEngine, RuleHelper, RuleResultNode, RuleSet, RuleSetResult, RuleStatus,
};
use serde_json::json;
use std::sync::Arc;

fn rule_set(json: serde_json::Value) -> RuleSet {
    serde_json::from_value(json).unwrap()
}

fn data(json: serde_json::Value) -> Value {
    Value::from(json)
}

async fn run(set: &RuleSet, input: &Value) -> RuleSetResult {
    RuleEngine::new().run(set, input, &Helpers::new()).await
}

// ============================================================================
// AND/OR folding
// ============================================================================

#[tokio::test]
async fn test_and_set_passes_only_when_every_rule_passes() {
    let set = rule_set(json!({
        "operator": "AND",
        "rules": [{ "key": "age", "operator": "GTE", "value": 18 }]
    }));

    let failed = run(&set, &data(json!({ "age": 17 }))).await;
    assert_eq!(failed.status, RuleStatus::Skipped);
    assert_eq!(failed.results.len(), 1);
    assert_eq!(failed.results[0].status(), RuleStatus::Failed);

    let passed = run(&set, &data(json!({ "age": 21 }))).await;
    assert_eq!(passed.status, RuleStatus::Passed);
    assert_eq!(passed.results[0].status(), RuleStatus::Passed);
}

#[tokio::test]
async fn test_or_set_passes_when_any_rule_passes() {
    let set = rule_set(json!({
        "operator": "OR",
        "rules": [
            { "key": "country", "operator": "EQUALS", "value": "GB" },
            { "key": "country", "operator": "EQUALS", "value": "DE" }
        ]
    }));

    let passed = run(&set, &data(json!({ "country": "DE" }))).await;
    assert_eq!(passed.status, RuleStatus::Passed);

    let failed = run(&set, &data(json!({ "country": "FR" }))).await;
    assert_eq!(failed.status, RuleStatus::Skipped);
}

#[tokio::test]
async fn test_nested_sets_fold_recursively() {
    let set = rule_set(json!({
        "operator": "AND",
        "rules": [
            { "key": "entity.type", "operator": "EQUALS", "value": "business" },
            {
                "operator": "OR",
                "rules": [
                    { "key": "entity.data.country", "operator": "IN", "value": ["DK", "SE"] },
                    { "key": "entity.data.euPassported", "operator": "EXISTS", "value": true }
                ]
            }
        ]
    }));

    let input = data(json!({
        "entity": { "type": "business", "data": { "country": "NO", "euPassported": true } }
    }));
    let result = run(&set, &input).await;

    assert_eq!(result.status, RuleStatus::Passed);
    assert_eq!(result.results.len(), 2);
    match &result.results[1] {
        RuleResultNode::Set(inner) => {
            assert_eq!(inner.status, RuleStatus::Passed);
            assert_eq!(inner.results.len(), 2);
        }
        other => panic!("expected nested set result, got {other:?}"),
    }
}

// ============================================================================
// Total evaluation
// ============================================================================

#[tokio::test]
async fn test_malformed_rules_never_panic_and_mirror_structure() {
    let set = rule_set(json!({
        "operator": "AND",
        "rules": [
            { "key": "missing.path", "operator": "EQUALS", "value": "x" },
            { "key": "age", "operator": "NO_SUCH_OPERATOR", "value": 1 },
            { "key": "age", "operator": "BETWEEN", "value": "not bounds" },
            { "key": "age", "operator": "GTE", "value": 18 }
        ]
    }));

    let result = run(&set, &data(json!({ "age": 30 }))).await;

    assert_eq!(result.results.len(), 4);
    assert_eq!(result.status, RuleStatus::Skipped);

    let statuses: Vec<RuleStatus> = result.results.iter().map(|node| node.status()).collect();
    assert_eq!(
        statuses,
        vec![
            RuleStatus::Failed,
            RuleStatus::Failed,
            RuleStatus::Failed,
            RuleStatus::Passed
        ]
    );

    match &result.results[1] {
        RuleResultNode::Rule(rule) => {
            assert_eq!(rule.error.as_deref(), Some("OPERATOR_NOT_FOUND"));
        }
        other => panic!("expected rule result, got {other:?}"),
    }
    match &result.results[0] {
        RuleResultNode::Rule(rule) => {
            assert_eq!(rule.error.as_deref(), Some("DATA_VALUE_NOT_FOUND"));
        }
        other => panic!("expected rule result, got {other:?}"),
    }
}

// ============================================================================
// Path comparison
// ============================================================================

#[tokio::test]
async fn test_path_comparison_resolves_both_sides() {
    let set = rule_set(json!({
        "operator": "AND",
        "rules": [{
            "key": "entity.data.registeredName",
            "operator": "EQUALS",
            "value": "pluginsOutput.companyCheck.name",
            "isPathComparison": true
        }]
    }));

    let matching = data(json!({
        "entity": { "data": { "registeredName": "Acme ApS" } },
        "pluginsOutput": { "companyCheck": { "name": "Acme ApS" } }
    }));
    assert_eq!(run(&set, &matching).await.status, RuleStatus::Passed);

    let differing = data(json!({
        "entity": { "data": { "registeredName": "Acme ApS" } },
        "pluginsOutput": { "companyCheck": { "name": "Acme Holdings" } }
    }));
    assert_eq!(
        run(&set, &differing).await.results[0].status(),
        RuleStatus::Failed
    );
}

// ============================================================================
// Fuzzy matching through the entity-matching helper
// ============================================================================

struct FixedScore(f64);

#[async_trait]
impl RuleHelper for FixedScore {
    async fn call(&self, _args: Value) -> anyhow::Result<Value> {
        Ok(Value::from(json!({ "similarityScore": self.0 })))
    }
}

#[tokio::test]
async fn test_fuzzy_match_score_lt_uses_helper_and_threshold() {
    let set = rule_set(json!({
        "operator": "AND",
        "rules": [{
            "key": "entity.data.companyName",
            "operator": "FUZZY_MATCH_SCORE_LT",
            "value": "Acme ApS",
            "threshold": 70
        }]
    }));
    let input = data(json!({ "entity": { "data": { "companyName": "Acme Aps" } } }));
    let engine = RuleEngine::new();

    let close = Helpers::new().with(names::ENTITY_MATCHING, Arc::new(FixedScore(92.0)));
    let result = engine.run(&set, &input, &close).await;
    assert_eq!(result.results[0].status(), RuleStatus::Failed);

    let distant = Helpers::new().with(names::ENTITY_MATCHING, Arc::new(FixedScore(40.0)));
    let result = engine.run(&set, &input, &distant).await;
    assert_eq!(result.results[0].status(), RuleStatus::Passed);
}

#[tokio::test]
async fn test_fuzzy_match_without_helper_fails_rule() {
    let set = rule_set(json!({
        "operator": "AND",
        "rules": [{
            "key": "entity.data.companyName",
            "operator": "FUZZY_MATCH_SCORE_LT",
            "value": "Acme ApS"
        }]
    }));
    let input = data(json!({ "entity": { "data": { "companyName": "Acme" } } }));

    let result = run(&set, &input).await;

    match &result.results[0] {
        RuleResultNode::Rule(rule) => {
            assert_eq!(rule.status, RuleStatus::Failed);
            assert_eq!(rule.error.as_deref(), Some("HELPER_NOT_FOUND"));
        }
        other => panic!("expected rule result, got {other:?}"),
    }
}
