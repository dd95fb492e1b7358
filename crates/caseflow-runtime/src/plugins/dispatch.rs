//! Dispatch-event plugins
//!
//! A dispatch-event plugin derives a payload from the context and delivers
//! it to host subscribers of its event name. Delivery failure selects the
//! error action so the machine can route to a retry or failure state.

use crate::transformer;
use caseflow_core::{DispatchEventPluginSpec, Value};

/// A resolved dispatchable event
#[derive(Debug, Clone)]
pub struct DispatchedEvent {
    pub event_name: String,
    pub payload: Value,
}

/// A dispatch-event plugin
#[derive(Debug, Clone)]
pub struct DispatchEventPlugin {
    pub spec: DispatchEventPluginSpec,
}

impl DispatchEventPlugin {
    pub fn new(spec: DispatchEventPluginSpec) -> Self {
        DispatchEventPlugin { spec }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn state_names(&self) -> &[String] {
        &self.spec.state_names
    }

    /// Resolve the event to dispatch from the invocation context
    pub fn plugin_event(&self, context: &Value) -> DispatchedEvent {
        DispatchedEvent {
            event_name: self.spec.event_name.clone(),
            payload: transformer::apply(&self.spec.transformers, context),
        }
    }

    pub fn success_action(&self) -> Option<&str> {
        self.spec.success_action.as_deref()
    }

    pub fn error_action(&self) -> Option<&str> {
        self.spec.error_action.as_deref()
    }
}
