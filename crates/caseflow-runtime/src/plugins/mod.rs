//! Plugin implementations
//!
//! Descriptors from `caseflow_core::extensions` are turned into the typed
//! plugin instances in this module by the registry. Plugin invocation is
//! total where the pipeline needs it to be: common and API plugins report
//! failures through their output instead of erroring, so one vendor outage
//! degrades into an error-path transition rather than a crashed pipeline.

pub mod child;
pub mod common;
pub mod dispatch;
pub mod http;
pub mod state;

use caseflow_core::Value;

/// Outcome of invoking a common plugin
#[derive(Debug, Clone, Default)]
pub struct PluginOutput {
    /// Follow-up event to feed back into the machine, if any
    pub callback_action: Option<String>,
    /// Response body to persist into the context
    pub response: Option<Value>,
    /// Failure description; set iff the invocation failed
    pub error: Option<String>,
}

/// Outcome of invoking an API plugin
#[derive(Debug, Clone, Default)]
pub struct HttpPluginOutput {
    pub callback_action: Option<String>,
    /// Transformed response body on success
    pub response_body: Option<Value>,
    /// Outbound payload, persisted for audit alongside the response
    pub request_payload: Option<Value>,
    pub error: Option<String>,
}
