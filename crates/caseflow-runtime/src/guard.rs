//! Transition guard evaluation
//!
//! Guards are evaluated over the machine context overlaid with the event
//! payload. Evaluation is total: a guard that cannot be evaluated blocks
//! the transition and reports its error instead of propagating it.

use caseflow_core::{GuardSpec, LogicExpr, LogicOp, Value, WorkflowEvent};

/// Result of evaluating a guard: the verdict plus any evaluation error
#[derive(Debug, Clone, PartialEq)]
pub struct GuardOutcome {
    pub passed: bool,
    pub error: Option<String>,
}

impl GuardOutcome {
    fn passed(passed: bool) -> Self {
        GuardOutcome {
            passed,
            error: None,
        }
    }

    fn errored(message: String) -> Self {
        GuardOutcome {
            passed: false,
            error: Some(message),
        }
    }
}

/// Evaluates guard predicates against context and event payload
#[derive(Debug, Default)]
pub struct GuardEvaluator;

impl GuardEvaluator {
    /// Evaluate a guard. Data is `{...context, ...event.payload}` with the
    /// payload taking precedence on key collisions.
    pub fn evaluate(spec: &GuardSpec, context: &Value, event: &WorkflowEvent) -> GuardOutcome {
        let data = evaluation_data(context, event);

        match spec {
            GuardSpec::Logic { rule, .. } => match eval_expr(rule, &data) {
                Ok(value) => GuardOutcome::passed(value.is_truthy()),
                Err(message) => GuardOutcome::errored(message),
            },
            GuardSpec::Path { rule } => {
                let passed = data
                    .get_path(rule)
                    .map(Value::is_truthy)
                    .unwrap_or(false);
                GuardOutcome::passed(passed)
            }
        }
    }
}

fn evaluation_data(context: &Value, event: &WorkflowEvent) -> Value {
    let mut data = context.clone();
    if data.as_object().is_none() {
        data = Value::object();
    }

    if let (Value::Object(map), Some(Value::Object(payload))) =
        (&mut data, event.payload.as_ref())
    {
        for (key, value) in payload {
            map.insert(key.clone(), value.clone());
        }
    }

    data
}

/// Evaluate a bare logic expression; also used for iterative plugin filters
pub(crate) fn eval_expr(expr: &LogicExpr, data: &Value) -> Result<Value, String> {
    match expr {
        LogicExpr::Literal(value) => Ok(value.clone()),
        LogicExpr::Op(op) => eval_op(op, data),
    }
}

fn eval_op(op: &LogicOp, data: &Value) -> Result<Value, String> {
    match op {
        LogicOp::Var(path) => Ok(data.get_path(path).cloned().unwrap_or(Value::Null)),
        LogicOp::And(operands) => {
            let mut last = Value::Bool(true);
            for operand in operands {
                last = eval_expr(operand, data)?;
                if !last.is_truthy() {
                    return Ok(last);
                }
            }
            Ok(last)
        }
        LogicOp::Or(operands) => {
            let mut last = Value::Bool(false);
            for operand in operands {
                last = eval_expr(operand, data)?;
                if last.is_truthy() {
                    return Ok(last);
                }
            }
            Ok(last)
        }
        LogicOp::Not(operand) => {
            let value = eval_expr(operand, data)?;
            Ok(Value::Bool(!value.is_truthy()))
        }
        LogicOp::Eq(operands) => {
            let (left, right) = binary(op, operands, data)?;
            Ok(Value::Bool(left == right))
        }
        LogicOp::Ne(operands) => {
            let (left, right) = binary(op, operands, data)?;
            Ok(Value::Bool(left != right))
        }
        LogicOp::Gt(operands) => compare(op, operands, data, |ord| ord == std::cmp::Ordering::Greater),
        LogicOp::Gte(operands) => compare(op, operands, data, |ord| ord != std::cmp::Ordering::Less),
        LogicOp::Lt(operands) => compare(op, operands, data, |ord| ord == std::cmp::Ordering::Less),
        LogicOp::Lte(operands) => {
            compare(op, operands, data, |ord| ord != std::cmp::Ordering::Greater)
        }
        LogicOp::In(operands) => {
            let (needle, haystack) = binary(op, operands, data)?;
            let contained = match &haystack {
                Value::Array(items) => items.contains(&needle),
                Value::String(text) => needle
                    .as_str()
                    .map(|sub| text.contains(sub))
                    .unwrap_or(false),
                _ => false,
            };
            Ok(Value::Bool(contained))
        }
    }
}

fn binary(op: &LogicOp, operands: &[LogicExpr], data: &Value) -> Result<(Value, Value), String> {
    if operands.len() != 2 {
        return Err(format!(
            "operator {} expects 2 operands, got {}",
            op_name(op),
            operands.len()
        ));
    }
    Ok((eval_expr(&operands[0], data)?, eval_expr(&operands[1], data)?))
}

fn compare(
    op: &LogicOp,
    operands: &[LogicExpr],
    data: &Value,
    accept: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, String> {
    let (left, right) = binary(op, operands, data)?;

    let ordering = match (&left, &right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match ordering {
        Some(ordering) => Ok(Value::Bool(accept(ordering))),
        None => Err(format!(
            "operator {} cannot compare {left:?} with {right:?}",
            op_name(op)
        )),
    }
}

fn op_name(op: &LogicOp) -> &'static str {
    match op {
        LogicOp::And(_) => "and",
        LogicOp::Or(_) => "or",
        LogicOp::Not(_) => "not",
        LogicOp::Var(_) => "var",
        LogicOp::Eq(_) => "==",
        LogicOp::Ne(_) => "!=",
        LogicOp::Gt(_) => ">",
        LogicOp::Gte(_) => ">=",
        LogicOp::Lt(_) => "<",
        LogicOp::Lte(_) => "<=",
        LogicOp::In(_) => "in",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logic_guard(rule: serde_json::Value) -> GuardSpec {
        serde_json::from_value(json!({
            "type": "json-logic",
            "rule": rule
        }))
        .unwrap()
    }

    #[test]
    fn test_logic_guard_passes() {
        let guard = logic_guard(json!({ ">": [{ "var": "amount" }, 1000] }));
        let context = Value::from(json!({ "amount": 2500 }));
        let event = WorkflowEvent::new("SUBMIT");

        let outcome = GuardEvaluator::evaluate(&guard, &context, &event);

        assert!(outcome.passed);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_payload_overlays_context() {
        let guard = logic_guard(json!({ "==": [{ "var": "decision" }, "approve"] }));
        let context = Value::from(json!({ "decision": "reject" }));
        let event =
            WorkflowEvent::new("DECIDE").with_payload(Value::from(json!({ "decision": "approve" })));

        assert!(GuardEvaluator::evaluate(&guard, &context, &event).passed);
    }

    #[test]
    fn test_missing_var_is_null_not_error() {
        let guard = logic_guard(json!({ "var": "no.such.path" }));
        let context = Value::from(json!({}));

        let outcome = GuardEvaluator::evaluate(&guard, &context, &WorkflowEvent::new("GO"));

        assert!(!outcome.passed);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_type_mismatch_reports_error() {
        let guard = logic_guard(json!({ ">": [{ "var": "amount" }, 1000] }));
        let context = Value::from(json!({ "amount": "a lot" }));

        let outcome = GuardEvaluator::evaluate(&guard, &context, &WorkflowEvent::new("GO"));

        assert!(!outcome.passed);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_and_or_short_circuit() {
        let guard = logic_guard(json!({
            "and": [
                { "var": "kycComplete" },
                { "or": [{ "var": "manualOverride" }, { "var": "riskScore" }] }
            ]
        }));
        let context = Value::from(json!({ "kycComplete": true, "riskScore": 12 }));

        assert!(GuardEvaluator::evaluate(&guard, &context, &WorkflowEvent::new("GO")).passed);
    }

    #[test]
    fn test_in_operator_on_arrays_and_strings() {
        let guard = logic_guard(json!({ "in": [{ "var": "country" }, ["DK", "SE", "NO"]] }));
        let context = Value::from(json!({ "country": "SE" }));
        assert!(GuardEvaluator::evaluate(&guard, &context, &WorkflowEvent::new("GO")).passed);

        let guard = logic_guard(json!({ "in": ["gmail", { "var": "email" }] }));
        let context = Value::from(json!({ "email": "person@gmail.com" }));
        assert!(GuardEvaluator::evaluate(&guard, &context, &WorkflowEvent::new("GO")).passed);
    }

    #[test]
    fn test_path_guard() {
        let guard: GuardSpec = serde_json::from_value(json!({
            "type": "path",
            "rule": "pluginsOutput.companyCheck.approved"
        }))
        .unwrap();

        let context = Value::from(json!({
            "pluginsOutput": { "companyCheck": { "approved": true } }
        }));
        assert!(GuardEvaluator::evaluate(&guard, &context, &WorkflowEvent::new("GO")).passed);

        let empty = Value::from(json!({}));
        assert!(!GuardEvaluator::evaluate(&guard, &empty, &WorkflowEvent::new("GO")).passed);
    }
}
