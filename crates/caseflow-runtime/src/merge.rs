//! Context merging
//!
//! Every context mutation in the engine funnels through here: plain deep
//! merges for plugin outputs, option-controlled array merges for the
//! DEEP_MERGE_CONTEXT built-in event, and dotted-path merges for plugin
//! persist destinations.

use caseflow_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for merging arrays under `DEEP_MERGE_CONTEXT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArrayMergeOption {
    /// Match elements by an `id`/`__id` field, merge matched pairs in place,
    /// append unmatched source elements
    #[default]
    ById,
    /// Merge positionally; the longer array's tail is kept
    ByIndex,
    /// Source array wholesale replaces the target array
    Replace,
}

/// Recursive record merge: nested records recurse, every other leaf takes
/// the source's value. Arrays are terminal here; use
/// [`deep_merge_with_options`] for array-aware merging.
pub fn deep_merge(source: &Value, target: &Value) -> Value {
    match (source, target) {
        (Value::Object(source_map), Value::Object(target_map)) => {
            let mut output = target_map.clone();

            for (key, source_value) in source_map {
                let merged = match target_map.get(key) {
                    Some(target_value) if source_value.as_object().is_some() => {
                        deep_merge(source_value, target_value)
                    }
                    _ => source_value.clone(),
                };
                output.insert(key.clone(), merged);
            }

            Value::Object(output)
        }
        _ => source.clone(),
    }
}

/// Deep merge honoring an array-merge strategy
pub fn deep_merge_with_options(source: &Value, target: &Value, option: ArrayMergeOption) -> Value {
    match (source, target) {
        (Value::Object(source_map), Value::Object(target_map)) => {
            let mut output = target_map.clone();

            for (key, source_value) in source_map {
                let merged = match target_map.get(key) {
                    Some(target_value) => {
                        deep_merge_with_options(source_value, target_value, option)
                    }
                    None => source_value.clone(),
                };
                output.insert(key.clone(), merged);
            }

            Value::Object(output)
        }
        (Value::Array(source_items), Value::Array(target_items)) => {
            Value::Array(merge_arrays(source_items, target_items, option))
        }
        _ => source.clone(),
    }
}

fn merge_arrays(source: &[Value], target: &[Value], option: ArrayMergeOption) -> Vec<Value> {
    match option {
        ArrayMergeOption::Replace => source.to_vec(),
        ArrayMergeOption::ByIndex => {
            let mut output = Vec::with_capacity(source.len().max(target.len()));

            for index in 0..source.len().max(target.len()) {
                let merged = match (source.get(index), target.get(index)) {
                    (Some(s), Some(t)) => deep_merge_with_options(s, t, option),
                    (Some(s), None) => s.clone(),
                    (None, Some(t)) => t.clone(),
                    (None, None) => unreachable!(),
                };
                output.push(merged);
            }

            output
        }
        ArrayMergeOption::ById => merge_arrays_by_id(source, target),
    }
}

fn element_id(value: &Value) -> Option<&Value> {
    let map = value.as_object()?;
    map.get("id").or_else(|| map.get("__id"))
}

/// Target order is preserved; matched elements are merged in place and
/// unmatched source elements are appended.
fn merge_arrays_by_id(source: &[Value], target: &[Value]) -> Vec<Value> {
    let mut consumed = vec![false; source.len()];

    let mut output: Vec<Value> = target
        .iter()
        .map(|target_item| {
            let target_id = match element_id(target_item) {
                Some(id) => id,
                None => return target_item.clone(),
            };

            let matched = source.iter().enumerate().find(|(index, source_item)| {
                !consumed[*index] && element_id(source_item) == Some(target_id)
            });

            match matched {
                Some((index, source_item)) => {
                    consumed[index] = true;
                    deep_merge_with_options(source_item, target_item, ArrayMergeOption::ById)
                }
                None => target_item.clone(),
            }
        })
        .collect();

    for (index, source_item) in source.iter().enumerate() {
        if !consumed[index] && element_id(source_item).is_some() {
            output.push(source_item.clone());
        }
    }

    output
}

/// Merge `payload` into `context` at an optional dotted path
///
/// Without a path the payload is merged at the root. With a path, the path
/// is walked (creating intermediate records as needed) and the payload is
/// merged at the leaf.
pub fn merge_to_context(context: &Value, payload: &Value, path: Option<&str>) -> Value {
    let path = match path {
        Some(path) if !path.is_empty() => path,
        _ => return deep_merge(payload, context),
    };

    let mut root = context.clone();
    if root.as_object().is_none() {
        root = Value::object();
    }

    let segments: Vec<&str> = path.split('.').collect();
    merge_at_path(&mut root, &segments, payload);
    root
}

fn merge_at_path(node: &mut Value, segments: &[&str], payload: &Value) {
    if node.as_object().is_none() {
        *node = Value::object();
    }
    let map = match node {
        Value::Object(map) => map,
        _ => return,
    };

    let key = segments[0].to_string();
    if segments.len() == 1 {
        let existing = map.get(&key).cloned().unwrap_or_else(Value::object);
        map.insert(key, deep_merge(payload, &existing));
        return;
    }

    let child = map.entry(key).or_insert_with(Value::object);
    merge_at_path(child, &segments[1..], payload);
}

/// Convenience: an object with a single key
pub fn object_with(key: &str, value: Value) -> Value {
    Value::Object(HashMap::from([(key.to_string(), value)]))
}
