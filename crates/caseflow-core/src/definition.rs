//! Workflow definition types
//!
//! A `WorkflowDefinition` is an immutable graph of named states consumed by
//! the engine. Each state carries an optional guarded transition table
//! (event name to target state), optional entry/exit action names, and an
//! optional final marker. Definitions are host-authored and read-only to the
//! engine.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Definition identifier, referenced by child-workflow plugins
    #[serde(default)]
    pub id: String,
    /// Name of the initial state
    pub initial: String,
    /// Initial machine context, used when no resumed context is supplied
    #[serde(default)]
    pub context: Option<Value>,
    /// Named states
    pub states: HashMap<String, StateNode>,
}

impl WorkflowDefinition {
    /// Look up a state node by name
    pub fn state(&self, name: &str) -> Option<&StateNode> {
        self.states.get(name)
    }

    /// Whether the named state exists and is final
    pub fn is_final_state(&self, name: &str) -> bool {
        self.states
            .get(name)
            .map(|state| state.kind == StateKind::Final)
            .unwrap_or(false)
    }
}

/// A single state within a workflow definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateNode {
    /// Transition table: event name to transition spec
    #[serde(default)]
    pub on: HashMap<String, TransitionSpec>,
    /// Entry action names, run in declared order
    #[serde(default)]
    pub entry: Vec<String>,
    /// Exit action names, run in declared order
    #[serde(default)]
    pub exit: Vec<String>,
    /// State kind; final states accept no further transitions of their own
    #[serde(default, rename = "type")]
    pub kind: StateKind,
    /// Free-form tags (e.g. "failure") surfaced in snapshots and audit logs
    #[serde(default)]
    pub tags: Vec<String>,
}

/// State kind marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    #[default]
    Normal,
    Final,
}

/// A transition entry: either a bare target state name or a guarded target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransitionSpec {
    /// Shorthand: `"EVENT": "targetState"`
    Target(String),
    /// Full form with an optional guard
    Guarded {
        target: String,
        #[serde(default)]
        cond: Option<GuardSpec>,
    },
}

impl TransitionSpec {
    /// Target state name
    pub fn target(&self) -> &str {
        match self {
            TransitionSpec::Target(target) => target,
            TransitionSpec::Guarded { target, .. } => target,
        }
    }

    /// Guard spec, if any
    pub fn cond(&self) -> Option<&GuardSpec> {
        match self {
            TransitionSpec::Target(_) => None,
            TransitionSpec::Guarded { cond, .. } => cond.as_ref(),
        }
    }
}

/// Guard predicate gating a transition
///
/// Two dialects are supported: a boolean logic tree evaluated over
/// `{...context, ...event.payload}`, and a path query that passes when the
/// value at the path is truthy. Guard evaluation never errors outward; a
/// failing or erroring guard blocks the transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GuardSpec {
    /// Boolean logic tree dialect
    #[serde(rename = "json-logic")]
    Logic {
        rule: LogicExpr,
        /// When set, a falsy or erroring evaluation raises an
        /// EVALUATION_ERROR notification for host-level escalation
        #[serde(default, rename = "assignOnFailure")]
        assign_on_failure: bool,
    },
    /// Path-query dialect: true iff the value at the path is truthy
    Path { rule: String },
}

/// A boolean logic expression tree
///
/// Serializes in operator-keyed form, e.g.
/// `{"and": [{">": [{"var": "age"}, 18]}, {"var": "approved"}]}`.
/// A bare JSON value is a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogicExpr {
    Op(LogicOp),
    Literal(Value),
}

/// Logic tree operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOp {
    And(Vec<LogicExpr>),
    Or(Vec<LogicExpr>),
    Not(Box<LogicExpr>),
    /// Variable reference: a dotted path into the evaluation data
    Var(String),
    #[serde(rename = "==")]
    Eq(Vec<LogicExpr>),
    #[serde(rename = "!=")]
    Ne(Vec<LogicExpr>),
    #[serde(rename = ">")]
    Gt(Vec<LogicExpr>),
    #[serde(rename = ">=")]
    Gte(Vec<LogicExpr>),
    #[serde(rename = "<")]
    Lt(Vec<LogicExpr>),
    #[serde(rename = "<=")]
    Lte(Vec<LogicExpr>),
    /// Membership: first operand contained in the second (array or string)
    In(Vec<LogicExpr>),
}
