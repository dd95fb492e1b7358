//! Caseflow Core - Core types and definitions for the caseflow workflow engine
//!
//! This crate provides the fundamental types shared across the caseflow
//! ecosystem:
//! - The `Value` tree for runtime context data
//! - Workflow definitions (states, transitions, guards)
//! - Workflow events and notification names
//! - Serializable plugin descriptors (extensions)
//! - Error types

pub mod definition;
pub mod error;
pub mod event;
pub mod extensions;
pub mod value;

// Re-export commonly used types
pub use definition::{
    GuardSpec, LogicExpr, LogicOp, StateKind, StateNode, TransitionSpec, WorkflowDefinition,
};
pub use error::CoreError;
pub use event::{ProcessStatus, WorkflowEvent};
pub use extensions::{
    ApiPluginSpec, ChildWorkflowPluginSpec, CommonPluginSpec, DispatchEventPluginSpec, HttpMethod,
    PluginWhen, StatePluginSpec, TransformerSpec, WorkflowExtensions,
};
pub use value::Value;
