//! Fixed operator catalog
//!
//! Every operator splits its work in two: `extract` pulls the operand pair
//! out of the evaluation data (direct extraction against the rule's value,
//! or path-comparison extraction reading two distinct paths), and `evaluate`
//! applies the predicate. Threshold-aware operators additionally read the
//! rule's `threshold`, and may resolve host data through the injected
//! helper bag.

use crate::error::RuleError;
use crate::helpers::{names, Helpers};
use crate::types::Rule;
use async_trait::async_trait;
use caseflow_core::Value;
use chrono::{Datelike, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Operand pair produced by extraction
#[derive(Debug, Clone)]
pub struct Operands {
    pub data_value: Value,
    pub condition_value: Value,
}

/// Evaluation options passed to every operator
pub struct EvalOptions<'a> {
    pub helpers: &'a Helpers,
    pub threshold: Option<f64>,
}

/// One operator of the fixed catalog
#[async_trait]
pub trait Operator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this operator reads the rule's `threshold` field
    fn threshold_aware(&self) -> bool {
        false
    }

    /// Operators whose `value` is a parameter object (e.g. BETWEEN) cannot
    /// be used in path-comparison mode
    fn supports_path_comparison(&self) -> bool {
        true
    }

    /// Extract `{data_value, condition_value}` from the evaluation data
    fn extract(&self, data: &Value, rule: &Rule) -> Result<Operands, RuleError> {
        let is_path = rule.is_path_comparison && self.supports_path_comparison();
        let data_value = data.get_path(&rule.key).cloned();

        if !is_path {
            let data_value = data_value
                .filter(|value| !value.is_null())
                .ok_or_else(|| RuleError::DataValueNotFound(rule.key.clone()))?;

            return Ok(Operands {
                data_value,
                condition_value: rule.value.clone(),
            });
        }

        let comparison_path = rule.value.as_str().ok_or_else(|| RuleError::ValidationFailed {
            operator: self.name().to_string(),
            message: "path comparison requires a string path as the rule value".to_string(),
        })?;

        let condition_value = data
            .get_path(comparison_path)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| RuleError::DataValueNotFound(comparison_path.to_string()))?;

        Ok(Operands {
            data_value: data_value.unwrap_or(Value::Null),
            condition_value,
        })
    }

    async fn evaluate(&self, operands: &Operands, options: &EvalOptions<'_>)
        -> Result<bool, RuleError>;
}

/// Build the catalog, keyed by operator name
pub(crate) fn build_catalog() -> HashMap<&'static str, Arc<dyn Operator>> {
    let operators: Vec<Arc<dyn Operator>> = vec![
        Arc::new(Equals),
        Arc::new(NotEquals),
        Arc::new(GreaterThan),
        Arc::new(LessThan),
        Arc::new(GreaterThanOrEqual),
        Arc::new(LessThanOrEqual),
        Arc::new(Between),
        Arc::new(In),
        Arc::new(NotIn),
        Arc::new(InCaseInsensitive),
        Arc::new(Exists),
        Arc::new(LastYear),
        Arc::new(FuzzyMatchScoreLt),
    ];

    operators.into_iter().map(|op| (op.name(), op)).collect()
}

fn is_primitive(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn require_primitive(operator: &str, role: &str, value: &Value) -> Result<(), RuleError> {
    if is_primitive(value) {
        return Ok(());
    }

    Err(RuleError::ValidationFailed {
        operator: operator.to_string(),
        message: format!("{role} must be a string, number, or boolean"),
    })
}

/// Ordering over primitives: numbers with numbers, strings with strings
fn ordering(operator: &str, left: &Value, right: &Value) -> Result<Ordering, RuleError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            a.partial_cmp(b).ok_or_else(|| RuleError::ValidationFailed {
                operator: operator.to_string(),
                message: "numbers are not comparable".to_string(),
            })
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(RuleError::ValidationFailed {
            operator: operator.to_string(),
            message: "operands must both be numbers or both be strings".to_string(),
        }),
    }
}

struct Equals;

#[async_trait]
impl Operator for Equals {
    fn name(&self) -> &'static str {
        "EQUALS"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        require_primitive(self.name(), "condition value", &operands.condition_value)?;
        Ok(operands.data_value == operands.condition_value)
    }
}

struct NotEquals;

#[async_trait]
impl Operator for NotEquals {
    fn name(&self) -> &'static str {
        "NOT_EQUALS"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        require_primitive(self.name(), "condition value", &operands.condition_value)?;
        Ok(operands.data_value != operands.condition_value)
    }
}

struct GreaterThan;

#[async_trait]
impl Operator for GreaterThan {
    fn name(&self) -> &'static str {
        "GT"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        Ok(ordering(self.name(), &operands.data_value, &operands.condition_value)?
            == Ordering::Greater)
    }
}

struct LessThan;

#[async_trait]
impl Operator for LessThan {
    fn name(&self) -> &'static str {
        "LT"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        Ok(ordering(self.name(), &operands.data_value, &operands.condition_value)?
            == Ordering::Less)
    }
}

struct GreaterThanOrEqual;

#[async_trait]
impl Operator for GreaterThanOrEqual {
    fn name(&self) -> &'static str {
        "GTE"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        Ok(ordering(self.name(), &operands.data_value, &operands.condition_value)?
            != Ordering::Less)
    }
}

struct LessThanOrEqual;

#[async_trait]
impl Operator for LessThanOrEqual {
    fn name(&self) -> &'static str {
        "LTE"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        Ok(ordering(self.name(), &operands.data_value, &operands.condition_value)?
            != Ordering::Greater)
    }
}

struct Between;

#[async_trait]
impl Operator for Between {
    fn name(&self) -> &'static str {
        "BETWEEN"
    }

    fn supports_path_comparison(&self) -> bool {
        false
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        let bounds = operands
            .condition_value
            .as_object()
            .ok_or_else(|| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: "condition value must be an object with min and max".to_string(),
            })?;

        let min = bounds.get("min").and_then(Value::as_f64);
        let max = bounds.get("max").and_then(Value::as_f64);
        let (min, max) = match (min, max) {
            (Some(min), Some(max)) => (min, max),
            _ => {
                return Err(RuleError::ValidationFailed {
                    operator: self.name().to_string(),
                    message: "min and max must be numbers".to_string(),
                })
            }
        };

        let value = operands
            .data_value
            .as_f64()
            .ok_or_else(|| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: "data value must be a number".to_string(),
            })?;

        Ok(value >= min && value <= max)
    }
}

struct In;

#[async_trait]
impl Operator for In {
    fn name(&self) -> &'static str {
        "IN"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        let items = operands
            .condition_value
            .as_array()
            .ok_or_else(|| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: "condition value must be an array".to_string(),
            })?;

        Ok(items.contains(&operands.data_value))
    }
}

struct NotIn;

#[async_trait]
impl Operator for NotIn {
    fn name(&self) -> &'static str {
        "NOT_IN"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        let items = operands
            .condition_value
            .as_array()
            .ok_or_else(|| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: "condition value must be an array".to_string(),
            })?;

        Ok(!items.contains(&operands.data_value))
    }
}

struct InCaseInsensitive;

impl InCaseInsensitive {
    /// String data matches on case-insensitive containment; other primitives
    /// on equality
    fn matches(data_value: &Value, item: &Value) -> bool {
        match (data_value, item) {
            (Value::String(data), Value::String(item)) => {
                data.to_lowercase().contains(&item.to_lowercase())
            }
            _ => data_value == item,
        }
    }
}

#[async_trait]
impl Operator for InCaseInsensitive {
    fn name(&self) -> &'static str {
        "IN_CASE_INSENSITIVE"
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        let items = operands
            .condition_value
            .as_array()
            .ok_or_else(|| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: "condition value must be an array".to_string(),
            })?;

        let matched = items.iter().any(|item| match &operands.data_value {
            Value::Array(values) => values.iter().any(|value| Self::matches(value, item)),
            value => Self::matches(value, item),
        });

        Ok(matched)
    }
}

struct Exists;

#[async_trait]
impl Operator for Exists {
    fn name(&self) -> &'static str {
        "EXISTS"
    }

    fn supports_path_comparison(&self) -> bool {
        false
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        let present = match &operands.data_value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Bool(_) | Value::Number(_) => true,
        };

        Ok(present)
    }
}

struct LastYear;

#[async_trait]
impl Operator for LastYear {
    fn name(&self) -> &'static str {
        "LAST_YEAR"
    }

    fn supports_path_comparison(&self) -> bool {
        false
    }

    async fn evaluate(&self, operands: &Operands, _: &EvalOptions<'_>) -> Result<bool, RuleError> {
        let years = operands
            .condition_value
            .get_path("years")
            .and_then(Value::as_f64)
            .ok_or_else(|| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: "condition value must be an object with a numeric `years`".to_string(),
            })? as i32;

        let raw = operands
            .data_value
            .as_str()
            .ok_or_else(|| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: "data value must be a date string".to_string(),
            })?;

        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| {
                chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive())
            })
            .map_err(|_| RuleError::ValidationFailed {
                operator: self.name().to_string(),
                message: format!("unparseable date: {raw}"),
            })?;

        let today = Utc::now().date_naive();
        // Feb 29 cutoffs fall back to Mar 1 of the earlier year
        let cutoff = today
            .with_year(today.year() - years)
            .or_else(|| NaiveDate::from_ymd_opt(today.year() - years, 3, 1))
            .unwrap_or(today);

        Ok(date >= cutoff)
    }
}

struct FuzzyMatchScoreLt;

#[async_trait]
impl Operator for FuzzyMatchScoreLt {
    fn name(&self) -> &'static str {
        "FUZZY_MATCH_SCORE_LT"
    }

    fn threshold_aware(&self) -> bool {
        true
    }

    async fn evaluate(
        &self,
        operands: &Operands,
        options: &EvalOptions<'_>,
    ) -> Result<bool, RuleError> {
        let threshold = options.threshold.unwrap_or(80.0);

        if !(0.0..=100.0).contains(&threshold) {
            return Err(RuleError::InvalidThreshold {
                operator: self.name().to_string(),
                message: "threshold must be between 0 and 100".to_string(),
            });
        }

        require_primitive(self.name(), "data value", &operands.data_value)?;
        require_primitive(self.name(), "condition value", &operands.condition_value)?;

        let helper = options.helpers.get(names::ENTITY_MATCHING)?;
        let args = Value::Object(HashMap::from([
            ("value".to_string(), operands.data_value.clone()),
            (
                "comparisonValue".to_string(),
                operands.condition_value.clone(),
            ),
        ]));

        let response = helper
            .call(args)
            .await
            .map_err(|err| RuleError::Helper(err.to_string()))?;

        let score = response
            .get_path("similarityScore")
            .and_then(Value::as_f64)
            .ok_or_else(|| RuleError::Helper(format!(
                "{}: missing similarity score in response",
                self.name()
            )))?;

        Ok(score < threshold)
    }
}
