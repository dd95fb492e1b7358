//! Workflow events and notification names

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// An inbound workflow event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Event name, matched against the current state's transition table
    #[serde(rename = "type")]
    pub event_type: String,
    /// Optional event payload, merged over the context for guard evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl WorkflowEvent {
    /// Create an event without a payload
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: None,
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Built-in events, implicitly available on every state
pub mod built_in {
    /// Wholesale context replacement: context becomes `payload.context`
    pub const UPDATE_CONTEXT: &str = "UPDATE_CONTEXT";
    /// Deep merge `payload.newContext` into the context, honoring
    /// `payload.arrayMergeOption`
    pub const DEEP_MERGE_CONTEXT: &str = "DEEP_MERGE_CONTEXT";
}

/// Well-known notification names delivered over the pub/sub boundary
pub mod notification {
    /// Emitted after every state change
    pub const STATE_UPDATE: &str = "STATE_UPDATE";
    /// Emitted around every state-plugin action (PENDING/SUCCESS/ERROR)
    pub const STATUS_UPDATE: &str = "STATUS_UPDATE";
    /// Emitted when a guard requests escalation of a failed evaluation
    pub const EVALUATION_ERROR: &str = "EVALUATION_ERROR";
    /// Host-level escalation of a plugin failure
    pub const ERROR: &str = "ERROR";
    /// Host-level escalation of an HTTP plugin failure
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
}

/// Status of an in-flight plugin action, carried in STATUS_UPDATE payloads
/// and persisted alongside HTTP plugin results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    Pending,
    Success,
    Error,
}

impl ProcessStatus {
    /// Stable string form, used when persisting into context
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Pending => "PENDING",
            ProcessStatus::Success => "SUCCESS",
            ProcessStatus::Error => "ERROR",
        }
    }
}
