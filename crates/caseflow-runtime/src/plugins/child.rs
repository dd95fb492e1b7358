//! Child-workflow plugins
//!
//! A child-workflow plugin derives a context slice for a nested case and
//! hands it to a spawner. Spawning is a seam: hosts with a persistence
//! layer spawn through it, while the in-process spawner runs children as
//! sibling runtimes in memory (useful for UBO-style nested checks and for
//! tests).

use crate::plugins::PluginOutput;
use crate::registry::PluginHandlers;
use crate::runtime::WorkflowRuntime;
use crate::transformer;
use async_trait::async_trait;
use caseflow_core::{ChildWorkflowPluginSpec, Value, WorkflowDefinition, WorkflowEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Request handed to a spawner
#[derive(Debug, Clone)]
pub struct ChildSpawnRequest {
    pub parent_runtime_id: String,
    pub definition_id: String,
    /// Initial context slice derived by the plugin's transformers
    pub context: Value,
    /// Event delivered into the child right after construction
    pub init_event: Option<String>,
}

/// Identity of a spawned child, persisted into the parent context
#[derive(Debug, Clone)]
pub struct ChildRuntimeIdentity {
    pub workflow_runtime_id: String,
    pub definition_id: String,
}

/// Spawner seam behind child-workflow plugins
#[async_trait]
pub trait ChildWorkflowSpawner: Send + Sync {
    async fn spawn(&self, request: ChildSpawnRequest) -> anyhow::Result<ChildRuntimeIdentity>;
}

/// Spawner that runs children as in-memory runtimes
#[derive(Default)]
pub struct InProcessSpawner {
    definitions: HashMap<String, WorkflowDefinition>,
    children: Mutex<HashMap<String, WorkflowRuntime>>,
}

impl InProcessSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition children can be spawned from
    pub fn with_definition(mut self, definition: WorkflowDefinition) -> Self {
        self.definitions.insert(definition.id.clone(), definition);
        self
    }

    /// Remove and return a spawned child runtime
    pub async fn take_child(&self, runtime_id: &str) -> Option<WorkflowRuntime> {
        self.children.lock().await.remove(runtime_id)
    }
}

#[async_trait]
impl ChildWorkflowSpawner for InProcessSpawner {
    async fn spawn(&self, request: ChildSpawnRequest) -> anyhow::Result<ChildRuntimeIdentity> {
        let definition = self
            .definitions
            .get(&request.definition_id)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no definition registered with id {}",
                    request.definition_id
                )
            })?
            .clone();

        let runtime_id = Uuid::new_v4().to_string();
        let mut child = WorkflowRuntime::builder(definition)
            .with_runtime_id(runtime_id.clone())
            .with_handlers(PluginHandlers::default())
            .with_context(request.context)
            .build()?;

        if let Some(init_event) = &request.init_event {
            child.send_event(WorkflowEvent::new(init_event)).await?;
        }

        let identity = ChildRuntimeIdentity {
            workflow_runtime_id: runtime_id.clone(),
            definition_id: request.definition_id,
        };
        self.children.lock().await.insert(runtime_id, child);

        Ok(identity)
    }
}

/// A child-workflow plugin bound to its spawner
pub struct ChildWorkflowPlugin {
    pub spec: ChildWorkflowPluginSpec,
    spawner: Arc<dyn ChildWorkflowSpawner>,
}

impl ChildWorkflowPlugin {
    pub fn new(spec: ChildWorkflowPluginSpec, spawner: Arc<dyn ChildWorkflowSpawner>) -> Self {
        ChildWorkflowPlugin { spec, spawner }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn state_names(&self) -> &[String] {
        &self.spec.state_names
    }

    /// Context path the child identity is persisted at
    pub fn persist_destination(&self) -> String {
        format!("childWorkflows.{}", self.spec.definition_id)
    }

    pub async fn invoke(&self, parent_runtime_id: &str, context: &Value) -> PluginOutput {
        let slice = transformer::apply(&self.spec.transformers, context);
        let request = ChildSpawnRequest {
            parent_runtime_id: parent_runtime_id.to_string(),
            definition_id: self.spec.definition_id.clone(),
            context: slice,
            init_event: self.spec.init_event.clone(),
        };

        match self.spawner.spawn(request).await {
            Ok(identity) => PluginOutput {
                callback_action: self.spec.success_action.clone(),
                response: Some(Value::Object(HashMap::from([
                    (
                        "workflowRuntimeId".to_string(),
                        Value::String(identity.workflow_runtime_id),
                    ),
                    (
                        "definitionId".to_string(),
                        Value::String(identity.definition_id),
                    ),
                ]))),
                error: None,
            },
            Err(error) => PluginOutput {
                callback_action: self.spec.error_action.clone(),
                response: None,
                error: Some(error.to_string()),
            },
        }
    }
}

impl std::fmt::Debug for ChildWorkflowPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildWorkflowPlugin")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
