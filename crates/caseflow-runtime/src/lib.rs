//! Caseflow Runtime - Workflow execution engine
//!
//! This crate drives workflow definitions at runtime: a state machine
//! interpreter, the plugin invocation pipeline with context persistence,
//! transition guards, context merging, the host notification bus, and the
//! per-runtime audit log.

pub mod audit;
pub mod bus;
pub mod error;
pub mod guard;
pub mod interpreter;
pub mod merge;
pub mod plugins;
pub mod registry;
pub mod runtime;
pub mod transformer;

// Re-export main types
pub use audit::{AuditCategory, AuditEntry, AuditLog};
pub use bus::{EventBus, EventSubscriber, Notification};
pub use error::{EngineError, Result};
pub use guard::{GuardEvaluator, GuardOutcome};
pub use interpreter::{StateMachineInterpreter, TransitionOutcome};
pub use merge::{deep_merge, deep_merge_with_options, merge_to_context, ArrayMergeOption};
pub use plugins::child::{
    ChildRuntimeIdentity, ChildSpawnRequest, ChildWorkflowPlugin, ChildWorkflowSpawner,
    InProcessSpawner,
};
pub use plugins::common::{
    CommonPlugin, IterationTarget, RuleSetBundle, TokenIssueRequest, WorkflowTokenAction,
};
pub use plugins::dispatch::{DispatchEventPlugin, DispatchedEvent};
pub use plugins::http::{ApiPlugin, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use plugins::state::{StateAction, StateActionInput, StatePlugin};
pub use plugins::{HttpPluginOutput, PluginOutput};
pub use registry::{PluginHandlers, PluginRegistry, PluginSet};
pub use runtime::{Snapshot, WorkflowRuntime, WorkflowRuntimeBuilder};
