//! Workflow runtime
//!
//! One `WorkflowRuntime` drives one case: it feeds events through the
//! interpreter, runs blocking state plugins around each transition, invokes
//! the plugins scoped to the entered state, persists their outputs into the
//! context, and feeds their follow-up events back through the same pipeline
//! via a work queue. Follow-up events are queued, never recursed into, so a
//! callback chain of any depth runs in constant stack space.

use crate::audit::{AuditCategory, AuditEntry, AuditLog};
use crate::bus::{EventBus, EventSubscriber, Notification};
use crate::error::{EngineError, Result};
use crate::interpreter::StateMachineInterpreter;
use crate::merge;
use crate::plugins::child::ChildWorkflowPlugin;
use crate::plugins::common::CommonPlugin;
use crate::plugins::dispatch::DispatchEventPlugin;
use crate::plugins::http::ApiPlugin;
use crate::plugins::state::{StateActionInput, StatePlugin};
use crate::registry::{PluginHandlers, PluginRegistry, PluginSet};
use caseflow_core::event::notification;
use caseflow_core::{
    PluginWhen, ProcessStatus, Value, WorkflowDefinition, WorkflowEvent, WorkflowExtensions,
};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// Point-in-time view of a runtime, for host persistence and resumption
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub state: String,
    pub context: Value,
    pub next_events: Vec<String>,
    pub tags: Vec<String>,
    pub done: bool,
}

/// An event waiting in the pipeline's work queue
#[derive(Debug, Clone)]
struct QueuedEvent {
    event: WorkflowEvent,
    /// Name of the plugin whose callback queued this event; `None` for the
    /// host-sent outer event
    synthetic_from: Option<String>,
}

/// Builder for a [`WorkflowRuntime`]
pub struct WorkflowRuntimeBuilder {
    definition: WorkflowDefinition,
    extensions: WorkflowExtensions,
    handlers: PluginHandlers,
    context: Option<Value>,
    config: Value,
    runtime_id: Option<String>,
    audit_enabled: bool,
}

impl WorkflowRuntimeBuilder {
    pub fn with_extensions(mut self, extensions: WorkflowExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_handlers(mut self, handlers: PluginHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Resume from a persisted context instead of the definition's initial
    /// context
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Host configuration exposed to plugins as `workflowRuntimeConfig`
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_runtime_id(mut self, runtime_id: impl Into<String>) -> Self {
        self.runtime_id = Some(runtime_id.into());
        self
    }

    pub fn with_audit_log(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<WorkflowRuntime> {
        let runtime_id = self
            .runtime_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let bus = Arc::new(EventBus::new());
        let plugins = PluginRegistry::build(&self.extensions, &self.handlers)?;

        let context = self
            .context
            .or_else(|| self.definition.context.clone())
            .unwrap_or_else(Value::object);

        let non_blocking: Vec<Arc<StatePlugin>> = plugins
            .state_plugins
            .iter()
            .filter(|plugin| !plugin.is_blocking)
            .cloned()
            .collect();

        let interpreter = StateMachineInterpreter::new(
            Arc::new(self.definition),
            None,
            context,
            self.handlers.actions.clone(),
            non_blocking,
            bus.clone(),
            runtime_id.clone(),
        )?;

        Ok(WorkflowRuntime {
            runtime_id,
            config: self.config,
            interpreter,
            plugins,
            bus,
            audit: AuditLog::new(self.audit_enabled),
        })
    }
}

/// A single case's workflow engine
pub struct WorkflowRuntime {
    runtime_id: String,
    config: Value,
    interpreter: StateMachineInterpreter,
    plugins: PluginSet,
    bus: Arc<EventBus>,
    audit: AuditLog,
}

impl WorkflowRuntime {
    pub fn builder(definition: WorkflowDefinition) -> WorkflowRuntimeBuilder {
        WorkflowRuntimeBuilder {
            definition,
            extensions: WorkflowExtensions::default(),
            handlers: PluginHandlers::default(),
            context: None,
            config: Value::object(),
            runtime_id: None,
            audit_enabled: false,
        }
    }

    pub fn runtime_id(&self) -> &str {
        &self.runtime_id
    }

    pub fn current_state(&self) -> &str {
        self.interpreter.current_state()
    }

    pub fn context(&self) -> &Value {
        self.interpreter.context()
    }

    pub fn done(&self) -> bool {
        self.interpreter.done()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.interpreter.current_state().to_string(),
            context: self.interpreter.context().clone(),
            next_events: self.interpreter.next_events(),
            tags: self.interpreter.current_tags().to_vec(),
            done: self.interpreter.done(),
        }
    }

    /// Replace the context wholesale, bypassing merge semantics
    pub fn override_context(&mut self, context: Value) {
        self.interpreter.set_context(context);
        self.audit.append(AuditEntry::new(
            AuditCategory::ContextChanged,
            "context overridden by host",
        ));
    }

    pub async fn subscribe(&self, kind: impl Into<String>, subscriber: Arc<dyn EventSubscriber>) {
        self.bus.subscribe(kind, subscriber).await;
    }

    pub fn logs(&self) -> &[AuditEntry] {
        self.audit.entries()
    }

    pub fn clear_logs(&mut self) {
        self.audit.clear();
    }

    /// Feed an event through the pipeline
    ///
    /// Only the outer event's precondition failure is returned as an error.
    /// Blocking state plugin failures are reported through STATUS_UPDATE and
    /// ERROR notifications and the audit log, and processing continues.
    /// Follow-up events queued by plugin callbacks are processed in order;
    /// their failures are recorded in the audit log and reported through an
    /// ERROR notification instead of erroring, so one failed callback cannot
    /// wedge the rest of the queue.
    pub async fn send_event(&mut self, event: WorkflowEvent) -> Result<()> {
        self.send_event_with_context(event, None).await
    }

    /// Like [`send_event`](Self::send_event), with extra data overlaid on
    /// the context API plugins see for the outer event only. The overlay is
    /// never persisted and does not reach follow-up events.
    pub async fn send_event_with_context(
        &mut self,
        event: WorkflowEvent,
        additional_context: Option<Value>,
    ) -> Result<()> {
        let mut queue = VecDeque::new();
        queue.push_back(QueuedEvent {
            event,
            synthetic_from: None,
        });

        while let Some(queued) = queue.pop_front() {
            let overlay = match queued.synthetic_from {
                None => additional_context.as_ref(),
                Some(_) => None,
            };
            match self.process_event(&queued, overlay).await {
                Ok(followups) => queue.extend(followups),
                Err(error) => {
                    let Some(source) = &queued.synthetic_from else {
                        return Err(error);
                    };
                    tracing::warn!(
                        event = %queued.event.event_type,
                        plugin = %source,
                        %error,
                        "follow-up event failed"
                    );
                    self.audit.append(
                        AuditEntry::new(AuditCategory::Error, error.to_string())
                            .with_event(queued.event.event_type.clone())
                            .with_plugin(source.clone()),
                    );
                    self.notify_error(notification::ERROR, error.to_string()).await;
                }
            }
        }

        Ok(())
    }

    /// Invoke a named plugin outside the transition pipeline
    ///
    /// The plugin runs against the current context, its output is persisted
    /// as usual, and any callback event is fed through `send_event`.
    pub async fn invoke_plugin(
        &mut self,
        name: &str,
        additional_context: Option<Value>,
    ) -> Result<()> {
        let followups = if let Some(plugin) = self.find_api_plugin(name) {
            self.invoke_api(&plugin, additional_context.as_ref()).await
        } else if let Some(plugin) = self.find_common_plugin(name) {
            self.invoke_common(&plugin).await
        } else if let Some(plugin) = self.find_child_plugin(name) {
            self.invoke_child(&plugin).await
        } else if let Some(plugin) = self.find_dispatch_plugin(name) {
            self.invoke_dispatch(&plugin).await
        } else {
            return Err(EngineError::UnknownPlugin(name.to_string()));
        };

        for followup in followups {
            self.send_event(followup.event).await?;
        }
        Ok(())
    }

    async fn process_event(
        &mut self,
        queued: &QueuedEvent,
        additional_context: Option<&Value>,
    ) -> Result<Vec<QueuedEvent>> {
        let event = &queued.event;
        self.audit.append(
            AuditEntry::new(
                AuditCategory::EventReceived,
                format!("received event {}", event.event_type),
            )
            .with_event(event.event_type.clone()),
        );

        if !self.interpreter.accepts(&event.event_type) {
            return Err(EngineError::Precondition {
                event: event.event_type.clone(),
                state: self.interpreter.current_state().to_string(),
            });
        }

        let entry_state = self.interpreter.current_state().to_string();
        self.run_blocking_plugins(&entry_state, PluginWhen::Pre, event)
            .await;

        let context_before = self.interpreter.context().clone();
        let outcome = self.interpreter.send(event).await?;

        if self.interpreter.context() != &context_before {
            self.audit.append(
                AuditEntry::new(AuditCategory::ContextChanged, "context updated")
                    .with_event(event.event_type.clone()),
            );
        }

        if !outcome.changed {
            self.audit.append(
                AuditEntry::new(
                    AuditCategory::Info,
                    format!("event {} caused no transition", event.event_type),
                )
                .with_event(event.event_type.clone()),
            );
            return Ok(Vec::new());
        }

        self.audit.append(
            AuditEntry::new(
                AuditCategory::StateTransition,
                format!(
                    "transitioned from {} to {}",
                    outcome.previous_state, outcome.new_state
                ),
            )
            .with_transition(outcome.previous_state.clone(), outcome.new_state.clone())
            .with_event(event.event_type.clone()),
        );

        let state_update = Notification::new(notification::STATE_UPDATE)
            .with_state(outcome.new_state.clone())
            .with_payload(self.interpreter.context().clone());
        if let Err(error) = self.bus.notify(state_update).await {
            tracing::debug!(%error, "state update notification failed");
        }

        let new_state = outcome.new_state.clone();
        let mut followups = Vec::new();

        for plugin in self.scoped_dispatch_plugins(&new_state) {
            followups.extend(self.invoke_dispatch(&plugin).await);
        }
        for plugin in self.scoped_child_plugins(&new_state) {
            followups.extend(self.invoke_child(&plugin).await);
        }
        for plugin in self.scoped_common_plugins(&new_state) {
            followups.extend(self.invoke_common(&plugin).await);
        }
        for plugin in self.scoped_api_plugins(&new_state) {
            followups.extend(self.invoke_api(&plugin, additional_context).await);
        }

        self.run_blocking_plugins(&new_state, PluginWhen::Post, event)
            .await;

        Ok(followups)
    }

    /// Run blocking state plugins for a state and phase
    ///
    /// A failure is surfaced through status and error notifications and the
    /// audit log; the remaining plugins still run and the event proceeds.
    async fn run_blocking_plugins(&mut self, state: &str, when: PluginWhen, event: &WorkflowEvent) {
        let plugins: Vec<Arc<StatePlugin>> = self
            .plugins
            .state_plugins
            .iter()
            .filter(|plugin| plugin.is_blocking && plugin.applies(state, when))
            .cloned()
            .collect();

        for plugin in plugins {
            self.audit.append(
                AuditEntry::new(
                    AuditCategory::PluginInvocation,
                    format!("running state plugin {}", plugin.name),
                )
                .with_plugin(plugin.name.clone()),
            );
            self.notify_plugin_status(&plugin.name, state, ProcessStatus::Pending, None)
                .await;

            let input = StateActionInput {
                workflow_runtime_id: self.runtime_id.clone(),
                state: state.to_string(),
                context: self.plugin_context(),
                event: event.clone(),
            };

            match plugin.action.run(input).await {
                Ok(()) => {
                    self.notify_plugin_status(&plugin.name, state, ProcessStatus::Success, None)
                        .await;
                }
                Err(error) => {
                    let message = error.to_string();
                    self.notify_plugin_status(
                        &plugin.name,
                        state,
                        ProcessStatus::Error,
                        Some(message.clone()),
                    )
                    .await;
                    self.notify_error(notification::ERROR, message.clone()).await;
                    self.audit.append(
                        AuditEntry::new(AuditCategory::Error, message)
                            .with_plugin(plugin.name.clone()),
                    );
                }
            }
        }
    }

    async fn invoke_dispatch(&mut self, plugin: &Arc<DispatchEventPlugin>) -> Vec<QueuedEvent> {
        self.audit_invocation(plugin.name());
        let dispatched = plugin.plugin_event(&self.plugin_context());

        let notification = Notification::new(dispatched.event_name.clone())
            .with_state(self.interpreter.current_state().to_string())
            .with_payload(dispatched.payload);

        match self.bus.notify(notification).await {
            Ok(()) => self.callback(plugin.name(), plugin.success_action()),
            Err(error) => {
                self.audit.append(
                    AuditEntry::new(AuditCategory::Error, error.to_string())
                        .with_plugin(plugin.name().to_string()),
                );
                self.callback(plugin.name(), plugin.error_action())
            }
        }
    }

    async fn invoke_child(&mut self, plugin: &Arc<ChildWorkflowPlugin>) -> Vec<QueuedEvent> {
        self.audit_invocation(plugin.name());
        let output = plugin.invoke(&self.runtime_id, &self.plugin_context()).await;

        if let Some(response) = &output.response {
            self.persist(response.clone(), &plugin.persist_destination(), plugin.name());
        }
        if let Some(error) = &output.error {
            self.audit.append(
                AuditEntry::new(AuditCategory::Error, error.clone())
                    .with_plugin(plugin.name().to_string()),
            );
            self.notify_error(notification::ERROR, error.clone()).await;
        }

        self.callback(plugin.name(), output.callback_action.as_deref())
    }

    async fn invoke_common(&mut self, plugin: &Arc<CommonPlugin>) -> Vec<QueuedEvent> {
        self.audit_invocation(plugin.name());
        let output = plugin.invoke(&self.runtime_id, &self.plugin_context()).await;

        if let Some(response) = &output.response {
            self.persist(response.clone(), &plugin.persist_destination(), plugin.name());
        }
        if let Some(error) = &output.error {
            self.persist(
                merge::object_with("error", Value::String(error.clone())),
                &format!("pluginsOutput.{}", plugin.name()),
                plugin.name(),
            );
            self.audit.append(
                AuditEntry::new(AuditCategory::Error, error.clone())
                    .with_plugin(plugin.name().to_string()),
            );
            self.notify_error(notification::ERROR, error.clone()).await;
        }

        self.callback(plugin.name(), output.callback_action.as_deref())
    }

    async fn invoke_api(
        &mut self,
        plugin: &Arc<ApiPlugin>,
        additional_context: Option<&Value>,
    ) -> Vec<QueuedEvent> {
        self.audit_invocation(plugin.name());
        let output = plugin
            .invoke(&self.plugin_context(), additional_context)
            .await;
        let status = if output.error.is_none() {
            ProcessStatus::Success
        } else {
            ProcessStatus::Error
        };

        if let Some(request_payload) = &output.request_payload {
            self.persist(
                merge::object_with("requestPayload", request_payload.clone()),
                &format!("pluginsInput.{}", plugin.name()),
                plugin.name(),
            );
        }

        let mut record = match output.response_body {
            Some(Value::Object(map)) => map,
            Some(other) => HashMap::from([("data".to_string(), other)]),
            None => HashMap::new(),
        };
        record.insert(
            "status".to_string(),
            Value::String(status.as_str().to_string()),
        );
        if let Some(error) = &output.error {
            record.insert("error".to_string(), Value::String(error.clone()));
        }
        self.persist(
            Value::Object(record),
            &plugin.persist_destination(),
            plugin.name(),
        );

        if let Some(error) = &output.error {
            self.audit.append(
                AuditEntry::new(AuditCategory::Error, error.clone())
                    .with_plugin(plugin.name().to_string()),
            );
            self.notify_error(notification::HTTP_ERROR, error.clone()).await;
        }

        if plugin.has_callback() {
            self.callback(plugin.name(), output.callback_action.as_deref())
        } else {
            Vec::new()
        }
    }

    fn callback(&self, plugin_name: &str, action: Option<&str>) -> Vec<QueuedEvent> {
        match action {
            Some(action) => vec![QueuedEvent {
                event: WorkflowEvent::new(action),
                synthetic_from: Some(plugin_name.to_string()),
            }],
            None => Vec::new(),
        }
    }

    /// Context as plugins see it: the machine context plus the runtime's
    /// identity and host configuration
    fn plugin_context(&self) -> Value {
        let mut context = self.interpreter.context().clone();
        if context.as_object().is_none() {
            context = Value::object();
        }
        if let Some(map) = context.as_object_mut() {
            map.insert(
                "workflowRuntimeId".to_string(),
                Value::String(self.runtime_id.clone()),
            );
            map.insert("workflowRuntimeConfig".to_string(), self.config.clone());
        }
        context
    }

    fn persist(&mut self, payload: Value, destination: &str, plugin_name: &str) {
        let merged = merge::merge_to_context(self.interpreter.context(), &payload, Some(destination));
        self.interpreter.set_context(merged);
        self.audit.append(
            AuditEntry::new(
                AuditCategory::ContextChanged,
                format!("persisted plugin output at {destination}"),
            )
            .with_plugin(plugin_name.to_string()),
        );
    }

    fn audit_invocation(&mut self, plugin_name: &str) {
        self.audit.append(
            AuditEntry::new(
                AuditCategory::PluginInvocation,
                format!("invoking plugin {plugin_name}"),
            )
            .with_plugin(plugin_name.to_string()),
        );
    }

    async fn notify_error(&self, kind: &str, message: String) {
        let notification = Notification::new(kind)
            .with_state(self.interpreter.current_state().to_string())
            .with_error(message);
        if let Err(error) = self.bus.notify(notification).await {
            tracing::debug!(%error, "error notification failed");
        }
    }

    async fn notify_plugin_status(
        &self,
        plugin_name: &str,
        state: &str,
        status: ProcessStatus,
        error: Option<String>,
    ) {
        let payload = Value::Object(HashMap::from([
            ("name".to_string(), Value::String(plugin_name.to_string())),
            (
                "status".to_string(),
                Value::String(status.as_str().to_string()),
            ),
        ]));
        let mut notification = Notification::new(notification::STATUS_UPDATE)
            .with_state(state.to_string())
            .with_payload(payload);
        if let Some(error) = error {
            notification = notification.with_error(error);
        }
        if let Err(error) = self.bus.notify(notification).await {
            tracing::debug!(%error, "status notification failed");
        }
    }

    fn scoped_api_plugins(&self, state: &str) -> Vec<Arc<ApiPlugin>> {
        self.plugins
            .api_plugins
            .iter()
            .filter(|plugin| plugin.state_names().iter().any(|name| name == state))
            .cloned()
            .collect()
    }

    fn scoped_child_plugins(&self, state: &str) -> Vec<Arc<ChildWorkflowPlugin>> {
        self.plugins
            .child_plugins
            .iter()
            .filter(|plugin| plugin.state_names().iter().any(|name| name == state))
            .cloned()
            .collect()
    }

    fn scoped_common_plugins(&self, state: &str) -> Vec<Arc<CommonPlugin>> {
        self.plugins
            .common_plugins
            .iter()
            .filter(|plugin| plugin.state_names().iter().any(|name| name == state))
            .cloned()
            .collect()
    }

    fn scoped_dispatch_plugins(&self, state: &str) -> Vec<Arc<DispatchEventPlugin>> {
        self.plugins
            .dispatch_plugins
            .iter()
            .filter(|plugin| plugin.state_names().iter().any(|name| name == state))
            .cloned()
            .collect()
    }

    fn find_api_plugin(&self, name: &str) -> Option<Arc<ApiPlugin>> {
        self.plugins
            .api_plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .cloned()
    }

    fn find_common_plugin(&self, name: &str) -> Option<Arc<CommonPlugin>> {
        self.plugins
            .common_plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .cloned()
    }

    fn find_child_plugin(&self, name: &str) -> Option<Arc<ChildWorkflowPlugin>> {
        self.plugins
            .child_plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .cloned()
    }

    fn find_dispatch_plugin(&self, name: &str) -> Option<Arc<DispatchEventPlugin>> {
        self.plugins
            .dispatch_plugins
            .iter()
            .find(|plugin| plugin.name() == name)
            .cloned()
    }
}

impl std::fmt::Debug for WorkflowRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRuntime")
            .field("runtime_id", &self.runtime_id)
            .field("current_state", &self.interpreter.current_state())
            .finish_non_exhaustive()
    }
}
