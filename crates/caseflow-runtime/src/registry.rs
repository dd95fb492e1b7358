//! Plugin registry
//!
//! Turns the serializable descriptors of `WorkflowExtensions` into typed
//! plugin instances, resolving every name reference eagerly so a
//! misconfigured workflow fails at construction, not mid-pipeline.

use crate::error::{EngineError, Result};
use crate::plugins::child::{ChildWorkflowPlugin, ChildWorkflowSpawner};
use crate::plugins::common::{CommonPlugin, IterationTarget, RuleSetBundle, WorkflowTokenAction};
use crate::plugins::dispatch::DispatchEventPlugin;
use crate::plugins::http::{ApiPlugin, HttpTransport, ReqwestTransport};
use crate::plugins::state::{StateAction, StatePlugin};
use caseflow_core::{CommonPluginSpec, WorkflowExtensions};
use caseflow_rules::{Helpers, RuleEngine};
use std::collections::HashMap;
use std::sync::Arc;

/// Host-provided callables and seams the registry resolves descriptors
/// against
pub struct PluginHandlers {
    /// Named state actions, referenced by state plugin descriptors and by
    /// definition entry/exit lists
    pub actions: HashMap<String, Arc<dyn StateAction>>,
    pub workflow_token_action: Option<Arc<dyn WorkflowTokenAction>>,
    pub child_spawner: Option<Arc<dyn ChildWorkflowSpawner>>,
    /// Transport for API plugins; defaults to the reqwest transport
    pub http_transport: Option<Arc<dyn HttpTransport>>,
    /// Helpers exposed to rule operators
    pub rule_helpers: Helpers,
}

impl Default for PluginHandlers {
    fn default() -> Self {
        PluginHandlers {
            actions: HashMap::new(),
            workflow_token_action: None,
            child_spawner: None,
            http_transport: None,
            rule_helpers: Helpers::new(),
        }
    }
}

impl PluginHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, name: impl Into<String>, action: Arc<dyn StateAction>) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    pub fn with_workflow_token_action(mut self, action: Arc<dyn WorkflowTokenAction>) -> Self {
        self.workflow_token_action = Some(action);
        self
    }

    pub fn with_child_spawner(mut self, spawner: Arc<dyn ChildWorkflowSpawner>) -> Self {
        self.child_spawner = Some(spawner);
        self
    }

    pub fn with_http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    pub fn with_rule_helpers(mut self, helpers: Helpers) -> Self {
        self.rule_helpers = helpers;
        self
    }
}

impl std::fmt::Debug for PluginHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandlers")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// The typed plugin instances attached to one runtime
#[derive(Debug, Default)]
pub struct PluginSet {
    pub state_plugins: Vec<Arc<StatePlugin>>,
    pub common_plugins: Vec<Arc<CommonPlugin>>,
    pub api_plugins: Vec<Arc<ApiPlugin>>,
    pub child_plugins: Vec<Arc<ChildWorkflowPlugin>>,
    pub dispatch_plugins: Vec<Arc<DispatchEventPlugin>>,
}

/// Builds a `PluginSet` from descriptors and handlers
pub struct PluginRegistry;

impl PluginRegistry {
    pub fn build(extensions: &WorkflowExtensions, handlers: &PluginHandlers) -> Result<PluginSet> {
        let mut set = PluginSet::default();

        let transport: Arc<dyn HttpTransport> = handlers
            .http_transport
            .clone()
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));

        for spec in &extensions.api_plugins {
            set.api_plugins
                .push(Arc::new(ApiPlugin::new(spec.clone(), transport.clone())));
        }

        for spec in &extensions.child_workflow_plugins {
            let spawner = handlers.child_spawner.clone().ok_or_else(|| {
                EngineError::PluginConfig(format!(
                    "child workflow plugin {} requires a child workflow spawner",
                    spec.name
                ))
            })?;
            set.child_plugins
                .push(Arc::new(ChildWorkflowPlugin::new(spec.clone(), spawner)));
        }

        for spec in &extensions.dispatch_event_plugins {
            set.dispatch_plugins
                .push(Arc::new(DispatchEventPlugin::new(spec.clone())));
        }

        for spec in &extensions.state_plugins {
            let action = handlers.actions.get(&spec.action).cloned().ok_or_else(|| {
                EngineError::PluginConfig(format!(
                    "state plugin {} references unregistered action {}",
                    spec.name, spec.action
                ))
            })?;
            set.state_plugins
                .push(Arc::new(StatePlugin::from_spec(spec, action)));
        }

        let rule_engine = Arc::new(RuleEngine::new());
        for spec in &extensions.common_plugins {
            let plugin = Self::build_common(spec, handlers, &set, &rule_engine)?;
            set.common_plugins.push(Arc::new(plugin));
        }

        Ok(set)
    }

    fn build_common(
        spec: &CommonPluginSpec,
        handlers: &PluginHandlers,
        set: &PluginSet,
        rule_engine: &Arc<RuleEngine>,
    ) -> Result<CommonPlugin> {
        match spec {
            CommonPluginSpec::Transformer {
                name,
                state_names,
                transformers,
                persist_response_destination,
            } => Ok(CommonPlugin::Transformer {
                name: name.clone(),
                state_names: state_names.clone(),
                transformers: transformers.clone(),
                persist_response_destination: persist_response_destination.clone(),
            }),
            CommonPluginSpec::RiskRules {
                name,
                state_names,
                rules_source,
            } => {
                let bundles: Vec<RuleSetBundle> =
                    rules_source.parse_into().map_err(|error| {
                        EngineError::PluginConfig(format!(
                            "risk rules plugin {name} has an invalid rules source: {error}"
                        ))
                    })?;
                Ok(CommonPlugin::RiskRules {
                    name: name.clone(),
                    state_names: state_names.clone(),
                    bundles,
                    engine: rule_engine.clone(),
                    helpers: handlers.rule_helpers.clone(),
                })
            }
            CommonPluginSpec::WorkflowToken {
                name,
                state_names,
                ui_definition_id,
                expire_in_minutes,
                success_action,
                error_action,
            } => {
                let action = handlers.workflow_token_action.clone().ok_or_else(|| {
                    EngineError::PluginConfig(format!(
                        "workflow token plugin {name} requires a workflow token action"
                    ))
                })?;
                Ok(CommonPlugin::WorkflowToken {
                    name: name.clone(),
                    state_names: state_names.clone(),
                    ui_definition_id: ui_definition_id.clone(),
                    expire_in_minutes: *expire_in_minutes,
                    success_action: success_action.clone(),
                    error_action: error_action.clone(),
                    action,
                })
            }
            CommonPluginSpec::Iterative {
                name,
                state_names,
                iterate_on,
                action_plugin_name,
                success_action,
                error_action,
                filter,
            } => {
                let target = Self::resolve_iteration_target(action_plugin_name, set)
                    .ok_or_else(|| {
                        EngineError::PluginConfig(format!(
                            "Action plugin with a name of {action_plugin_name} was not found"
                        ))
                    })?;
                Ok(CommonPlugin::Iterative {
                    name: name.clone(),
                    state_names: state_names.clone(),
                    iterate_on: iterate_on.clone(),
                    target,
                    success_action: success_action.clone(),
                    error_action: error_action.clone(),
                    filter: filter.clone(),
                })
            }
        }
    }

    fn resolve_iteration_target(name: &str, set: &PluginSet) -> Option<IterationTarget> {
        if let Some(api) = set.api_plugins.iter().find(|plugin| plugin.name() == name) {
            return Some(IterationTarget::Api(api.clone()));
        }
        set.child_plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .map(|child| IterationTarget::Child(child.clone()))
    }
}
