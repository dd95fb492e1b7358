//! Transformer chains
//!
//! Transformers reshape context data for plugin inputs and outputs. A chain
//! runs left to right, each step consuming the previous step's output.
//! Transformation is total: a missing path yields null rather than an error.

use caseflow_core::{TransformerSpec, Value};
use std::collections::HashMap;

/// Apply a transformer chain to a value
pub fn apply(chain: &[TransformerSpec], input: &Value) -> Value {
    chain.iter().fold(input.clone(), |value, step| match step {
        TransformerSpec::Path { mapping } => {
            value.get_path(mapping).cloned().unwrap_or(Value::Null)
        }
        TransformerSpec::Mapping { mapping } => {
            let mut output = HashMap::with_capacity(mapping.len());
            for (target_key, source_path) in mapping {
                let selected = value.get_path(source_path).cloned().unwrap_or(Value::Null);
                output.insert(target_key.clone(), selected);
            }
            Value::Object(output)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chain(specs: serde_json::Value) -> Vec<TransformerSpec> {
        serde_json::from_value(specs).unwrap()
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let input = Value::from(json!({ "a": 1 }));
        assert_eq!(apply(&[], &input), input);
    }

    #[test]
    fn test_path_selects_subtree() {
        let specs = chain(json!([{ "transformer": "path", "mapping": "entity.data.ubos" }]));
        let input = Value::from(json!({
            "entity": { "data": { "ubos": [{ "name": "Ada" }] } }
        }));

        assert_eq!(apply(&specs, &input), Value::from(json!([{ "name": "Ada" }])));
    }

    #[test]
    fn test_missing_path_yields_null() {
        let specs = chain(json!([{ "transformer": "path", "mapping": "no.such.path" }]));
        assert_eq!(apply(&specs, &Value::from(json!({}))), Value::Null);
    }

    #[test]
    fn test_mapping_builds_object() {
        let specs = chain(json!([{
            "transformer": "mapping",
            "mapping": {
                "companyName": "entity.data.companyName",
                "country": "entity.data.country"
            }
        }]));
        let input = Value::from(json!({
            "entity": { "data": { "companyName": "Acme ApS", "country": "DK" } }
        }));

        assert_eq!(
            apply(&specs, &input),
            Value::from(json!({ "companyName": "Acme ApS", "country": "DK" }))
        );
    }

    #[test]
    fn test_chain_feeds_forward() {
        let specs = chain(json!([
            { "transformer": "path", "mapping": "entity.data" },
            { "transformer": "mapping", "mapping": { "name": "companyName" } }
        ]));
        let input = Value::from(json!({
            "entity": { "data": { "companyName": "Acme ApS" } }
        }));

        assert_eq!(apply(&specs, &input), Value::from(json!({ "name": "Acme ApS" })));
    }
}
