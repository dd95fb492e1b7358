//! Caseflow Rules - Nested rule evaluation engine
//!
//! Evaluates host-authored AND/OR rule trees against arbitrary context data.
//! The engine is a total function: malformed rules, unknown operators, and
//! missing data paths all become FAILED results carrying the error, never
//! panics or propagated errors, and the result tree always mirrors the
//! structure of the input tree.

pub mod engine;
pub mod error;
pub mod helpers;
pub mod operators;
pub mod types;

// Re-export main types
pub use engine::RuleEngine;
pub use error::RuleError;
pub use helpers::{Helpers, RuleHelper};
pub use types::{
    Rule, RuleOrSet, RuleResult, RuleResultNode, RuleSet, RuleSetResult, RuleStatus, SetOperator,
};
