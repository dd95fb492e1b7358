//! Common plugins
//!
//! The four `pluginKind`-discriminated plugin shapes: context transformers,
//! risk rule evaluation, workflow token issuance, and iteration over a
//! context-derived list. The registry constructs exactly one variant per
//! descriptor through the closed `CommonPlugin` enum.

use crate::guard;
use crate::plugins::child::ChildWorkflowPlugin;
use crate::plugins::http::ApiPlugin;
use crate::plugins::PluginOutput;
use crate::transformer;
use async_trait::async_trait;
use caseflow_core::{LogicExpr, TransformerSpec, Value};
use caseflow_rules::{Helpers, RuleEngine, RuleSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One named rule set inside a risk-rules plugin's source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetBundle {
    pub name: String,
    pub rule_set: RuleSet,
}

/// Request handed to a workflow token action
#[derive(Debug, Clone)]
pub struct TokenIssueRequest {
    pub workflow_runtime_id: String,
    pub ui_definition_id: String,
    pub expire_in_minutes: Option<u32>,
    pub context: Value,
}

/// Host-provided issuer behind workflow token plugins
#[async_trait]
pub trait WorkflowTokenAction: Send + Sync {
    async fn issue(&self, request: TokenIssueRequest) -> anyhow::Result<Value>;
}

/// Target a plugin iterates its items through
#[derive(Debug, Clone)]
pub enum IterationTarget {
    Api(Arc<ApiPlugin>),
    Child(Arc<ChildWorkflowPlugin>),
}

impl IterationTarget {
    async fn invoke(&self, runtime_id: &str, item: &Value) -> PluginOutput {
        match self {
            IterationTarget::Api(plugin) => {
                let output = plugin.invoke(item, None).await;
                PluginOutput {
                    callback_action: output.callback_action,
                    response: output.response_body,
                    error: output.error,
                }
            }
            IterationTarget::Child(plugin) => plugin.invoke(runtime_id, item).await,
        }
    }
}

/// A common plugin, one per `pluginKind`
pub enum CommonPlugin {
    Transformer {
        name: String,
        state_names: Vec<String>,
        transformers: Vec<TransformerSpec>,
        persist_response_destination: Option<String>,
    },
    RiskRules {
        name: String,
        state_names: Vec<String>,
        bundles: Vec<RuleSetBundle>,
        engine: Arc<RuleEngine>,
        helpers: Helpers,
    },
    WorkflowToken {
        name: String,
        state_names: Vec<String>,
        ui_definition_id: String,
        expire_in_minutes: Option<u32>,
        success_action: Option<String>,
        error_action: Option<String>,
        action: Arc<dyn WorkflowTokenAction>,
    },
    Iterative {
        name: String,
        state_names: Vec<String>,
        iterate_on: Vec<TransformerSpec>,
        target: IterationTarget,
        success_action: Option<String>,
        error_action: Option<String>,
        filter: Vec<LogicExpr>,
    },
}

impl CommonPlugin {
    pub fn name(&self) -> &str {
        match self {
            CommonPlugin::Transformer { name, .. } => name,
            CommonPlugin::RiskRules { name, .. } => name,
            CommonPlugin::WorkflowToken { name, .. } => name,
            CommonPlugin::Iterative { name, .. } => name,
        }
    }

    pub fn state_names(&self) -> &[String] {
        match self {
            CommonPlugin::Transformer { state_names, .. } => state_names,
            CommonPlugin::RiskRules { state_names, .. } => state_names,
            CommonPlugin::WorkflowToken { state_names, .. } => state_names,
            CommonPlugin::Iterative { state_names, .. } => state_names,
        }
    }

    /// Context path the response is persisted at
    pub fn persist_destination(&self) -> String {
        let explicit = match self {
            CommonPlugin::Transformer {
                persist_response_destination,
                ..
            } => persist_response_destination.as_deref(),
            _ => None,
        };
        explicit
            .map(str::to_string)
            .unwrap_or_else(|| format!("pluginsOutput.{}", self.name()))
    }

    pub async fn invoke(&self, runtime_id: &str, context: &Value) -> PluginOutput {
        match self {
            CommonPlugin::Transformer { transformers, .. } => PluginOutput {
                callback_action: None,
                response: Some(transformer::apply(transformers, context)),
                error: None,
            },
            CommonPlugin::RiskRules {
                bundles,
                engine,
                helpers,
                ..
            } => self.invoke_risk_rules(bundles, engine, helpers, context).await,
            CommonPlugin::WorkflowToken {
                ui_definition_id,
                expire_in_minutes,
                success_action,
                error_action,
                action,
                ..
            } => {
                let request = TokenIssueRequest {
                    workflow_runtime_id: runtime_id.to_string(),
                    ui_definition_id: ui_definition_id.clone(),
                    expire_in_minutes: *expire_in_minutes,
                    context: context.clone(),
                };
                match action.issue(request).await {
                    Ok(response) => PluginOutput {
                        callback_action: success_action.clone(),
                        response: Some(response),
                        error: None,
                    },
                    Err(error) => PluginOutput {
                        callback_action: error_action.clone(),
                        response: None,
                        error: Some(error.to_string()),
                    },
                }
            }
            CommonPlugin::Iterative {
                iterate_on,
                target,
                success_action,
                error_action,
                filter,
                ..
            } => {
                self.invoke_iterative(
                    iterate_on,
                    target,
                    success_action.as_deref(),
                    error_action.as_deref(),
                    filter,
                    runtime_id,
                    context,
                )
                .await
            }
        }
    }

    async fn invoke_risk_rules(
        &self,
        bundles: &[RuleSetBundle],
        engine: &RuleEngine,
        helpers: &Helpers,
        context: &Value,
    ) -> PluginOutput {
        let mut report = HashMap::with_capacity(bundles.len());

        for bundle in bundles {
            let result = engine.run(&bundle.rule_set, context, helpers).await;
            let serialized = serde_json::to_value(&result)
                .map(Value::from)
                .unwrap_or(Value::Null);
            report.insert(bundle.name.clone(), serialized);
        }

        PluginOutput {
            callback_action: None,
            response: Some(Value::Object(report)),
            error: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn invoke_iterative(
        &self,
        iterate_on: &[TransformerSpec],
        target: &IterationTarget,
        success_action: Option<&str>,
        error_action: Option<&str>,
        filter: &[LogicExpr],
        runtime_id: &str,
        context: &Value,
    ) -> PluginOutput {
        let source = transformer::apply(iterate_on, context);
        let items = match source.as_array() {
            Some(items) => items.clone(),
            None => {
                tracing::warn!(plugin = %self.name(), "iteration source is not a list, skipping");
                return PluginOutput {
                    callback_action: success_action.map(str::to_string),
                    response: Some(Value::Object(HashMap::from([(
                        "skipped".to_string(),
                        Value::Bool(true),
                    )]))),
                    error: None,
                };
            }
        };

        let mut results = Vec::with_capacity(items.len());
        let mut failures = 0usize;

        for item in &items {
            if !passes_filters(filter, item) {
                continue;
            }

            let output = target.invoke(runtime_id, item).await;
            if output.error.is_some() {
                failures += 1;
            }
            let mut entry = HashMap::from([("item".to_string(), item.clone())]);
            if let Some(response) = output.response {
                entry.insert("response".to_string(), response);
            }
            if let Some(error) = output.error {
                entry.insert("error".to_string(), Value::String(error));
            }
            results.push(Value::Object(entry));
        }

        let processed = results.len();
        let response = Value::Array(results);

        if failures > 0 {
            PluginOutput {
                callback_action: error_action.map(str::to_string),
                response: Some(response),
                error: Some(format!("{failures} of {processed} iterations failed")),
            }
        } else {
            PluginOutput {
                callback_action: success_action.map(str::to_string),
                response: Some(response),
                error: None,
            }
        }
    }
}

fn passes_filters(filter: &[LogicExpr], item: &Value) -> bool {
    filter.iter().all(|expr| {
        guard::eval_expr(expr, item)
            .map(|value| value.is_truthy())
            .unwrap_or(false)
    })
}

impl std::fmt::Debug for CommonPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommonPlugin")
            .field("name", &self.name())
            .field("state_names", &self.state_names())
            .finish_non_exhaustive()
    }
}
