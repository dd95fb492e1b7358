//! Serializable plugin descriptors ("extensions")
//!
//! Hosts attach behavior to a workflow through five scoped lists of plugin
//! descriptors. Descriptors are plain data: the runtime's plugin registry
//! turns them into typed plugin instances through a closed factory, keyed by
//! the `pluginKind` discriminant, never by runtime type inspection.

use crate::definition::LogicExpr;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The five scoped plugin descriptor lists attached to one workflow runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowExtensions {
    pub state_plugins: Vec<StatePluginSpec>,
    pub common_plugins: Vec<CommonPluginSpec>,
    pub api_plugins: Vec<ApiPluginSpec>,
    pub child_workflow_plugins: Vec<ChildWorkflowPluginSpec>,
    pub dispatch_event_plugins: Vec<DispatchEventPluginSpec>,
}

/// When a state plugin runs relative to its state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginWhen {
    Pre,
    Post,
}

/// State plugin descriptor: an entry/exit hook bound to named states
///
/// Blocking plugins run inline within the pipeline; non-blocking plugins are
/// installed as entry/exit actions of their scoped states. The `action` field
/// names a host-registered action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePluginSpec {
    pub name: String,
    pub state_names: Vec<String>,
    pub when: PluginWhen,
    #[serde(default)]
    pub is_blocking: bool,
    pub action: String,
}

/// Common plugin descriptor, discriminated by `pluginKind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "pluginKind", rename_all = "camelCase")]
pub enum CommonPluginSpec {
    /// Runs a named action plugin once per item of a context-derived array
    #[serde(rename_all = "camelCase")]
    Iterative {
        name: String,
        state_names: Vec<String>,
        /// Transformer chain resolving the array to iterate on
        iterate_on: Vec<TransformerSpec>,
        /// Name of the API or child-workflow plugin invoked per item
        action_plugin_name: String,
        #[serde(default)]
        success_action: Option<String>,
        #[serde(default)]
        error_action: Option<String>,
        /// Per-item filters; an item is processed only if every filter passes
        #[serde(default)]
        filter: Vec<LogicExpr>,
    },
    /// Applies a transformer chain to the context and persists the result
    #[serde(rename_all = "camelCase")]
    Transformer {
        name: String,
        state_names: Vec<String>,
        transformers: Vec<TransformerSpec>,
        #[serde(default)]
        persist_response_destination: Option<String>,
    },
    /// Evaluates risk rule sets against the context
    #[serde(rename_all = "camelCase")]
    RiskRules {
        name: String,
        state_names: Vec<String>,
        /// Raw rule-set source; parsed by the registry into typed rule sets
        rules_source: Value,
    },
    /// Issues a scoped workflow token through a host-provided action
    #[serde(rename = "attach-ui-definition", rename_all = "camelCase")]
    WorkflowToken {
        name: String,
        state_names: Vec<String>,
        ui_definition_id: String,
        #[serde(default)]
        expire_in_minutes: Option<u32>,
        #[serde(default)]
        success_action: Option<String>,
        #[serde(default)]
        error_action: Option<String>,
    },
}

impl CommonPluginSpec {
    /// Descriptor name
    pub fn name(&self) -> &str {
        match self {
            CommonPluginSpec::Iterative { name, .. } => name,
            CommonPluginSpec::Transformer { name, .. } => name,
            CommonPluginSpec::RiskRules { name, .. } => name,
            CommonPluginSpec::WorkflowToken { name, .. } => name,
        }
    }
}

/// HTTP method for API plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

/// API (HTTP) plugin descriptor: a vendor-agnostic outbound call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPluginSpec {
    pub name: String,
    pub state_names: Vec<String>,
    /// URL template; `{dotted.path}` placeholders are resolved from the
    /// invocation context and percent-encoded
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Transformer chain shaping the outbound request payload
    #[serde(default)]
    pub request: Vec<TransformerSpec>,
    /// Transformer chain shaping the persisted response body
    #[serde(default)]
    pub response: Vec<TransformerSpec>,
    /// Follow-up event on success; a callback fires only when BOTH success
    /// and error actions are declared
    #[serde(default)]
    pub success_action: Option<String>,
    /// Follow-up event on failure
    #[serde(default)]
    pub error_action: Option<String>,
    /// Dotted context path for the response body; defaults to
    /// `pluginsOutput.<name>`
    #[serde(default)]
    pub persist_response_destination: Option<String>,
    /// Per-plugin request timeout in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Child-workflow plugin descriptor: spawns/links a nested runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildWorkflowPluginSpec {
    pub name: String,
    pub state_names: Vec<String>,
    /// Definition the child runtime is built from
    pub definition_id: String,
    /// Transformer chain deriving the child's initial context slice
    #[serde(default)]
    pub transformers: Vec<TransformerSpec>,
    /// Event delivered into the child right after it is spawned
    #[serde(default)]
    pub init_event: Option<String>,
    #[serde(default)]
    pub success_action: Option<String>,
    #[serde(default)]
    pub error_action: Option<String>,
}

/// Dispatch-event plugin descriptor: notifies a host subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEventPluginSpec {
    pub name: String,
    pub state_names: Vec<String>,
    /// Subscription name the resolved event is delivered to
    pub event_name: String,
    /// Transformer chain deriving the dispatched payload from the context
    #[serde(default)]
    pub transformers: Vec<TransformerSpec>,
    #[serde(default)]
    pub success_action: Option<String>,
    #[serde(default)]
    pub error_action: Option<String>,
}

/// One step of a transformer chain
///
/// Chains run left to right; each step receives the previous step's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transformer", rename_all = "camelCase")]
pub enum TransformerSpec {
    /// Select the subtree at a dotted path (missing path yields null)
    Path { mapping: String },
    /// Build a new object mapping target keys to dotted source paths
    Mapping { mapping: HashMap<String, String> },
}
