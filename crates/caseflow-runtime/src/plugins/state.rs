//! State plugins
//!
//! Entry/exit hooks bound to named states. The callable side is a
//! host-registered `StateAction`; the descriptor decides where and when it
//! runs and whether a failure blocks the pipeline.

use async_trait::async_trait;
use caseflow_core::{PluginWhen, StatePluginSpec, Value, WorkflowEvent};
use std::sync::Arc;

/// Input handed to a state action on invocation
#[derive(Debug, Clone)]
pub struct StateActionInput {
    pub workflow_runtime_id: String,
    pub state: String,
    pub context: Value,
    pub event: WorkflowEvent,
}

/// Host-registered callable behind a state plugin
#[async_trait]
pub trait StateAction: Send + Sync {
    async fn run(&self, input: StateActionInput) -> anyhow::Result<()>;
}

/// A state plugin bound to its resolved action
pub struct StatePlugin {
    pub name: String,
    pub state_names: Vec<String>,
    pub when: PluginWhen,
    pub is_blocking: bool,
    pub action_name: String,
    pub action: Arc<dyn StateAction>,
}

impl StatePlugin {
    pub fn from_spec(spec: &StatePluginSpec, action: Arc<dyn StateAction>) -> Self {
        StatePlugin {
            name: spec.name.clone(),
            state_names: spec.state_names.clone(),
            when: spec.when,
            is_blocking: spec.is_blocking,
            action_name: spec.action.clone(),
            action,
        }
    }

    /// Whether this plugin applies to `state` at phase `when`
    pub fn applies(&self, state: &str, when: PluginWhen) -> bool {
        self.when == when && self.state_names.iter().any(|name| name == state)
    }
}

impl std::fmt::Debug for StatePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePlugin")
            .field("name", &self.name)
            .field("state_names", &self.state_names)
            .field("when", &self.when)
            .field("is_blocking", &self.is_blocking)
            .field("action_name", &self.action_name)
            .finish_non_exhaustive()
    }
}
