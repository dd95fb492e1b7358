//! State machine interpreter
//!
//! A flat interpreter over a `WorkflowDefinition`: one current state, one
//! context tree, a guarded transition per event. Built-in context events
//! mutate the context without transitioning. The interpreter owns entry and
//! exit actions; everything else about event processing (blocking plugins,
//! scoped plugin invocation, persistence) lives in the runtime pipeline.

use crate::bus::{EventBus, Notification};
use crate::error::{EngineError, Result};
use crate::guard::GuardEvaluator;
use crate::merge;
use crate::plugins::state::{StateAction, StateActionInput, StatePlugin};
use caseflow_core::event::{built_in, notification};
use caseflow_core::{GuardSpec, PluginWhen, ProcessStatus, Value, WorkflowDefinition, WorkflowEvent};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of feeding one event to the interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Whether the machine moved to a different state
    pub changed: bool,
    pub previous_state: String,
    pub new_state: String,
}

pub struct StateMachineInterpreter {
    definition: Arc<WorkflowDefinition>,
    current_state: String,
    context: Value,
    /// Named entry/exit actions from the host
    named_actions: HashMap<String, Arc<dyn StateAction>>,
    /// Non-blocking state plugins, run as entry/exit hooks of their states
    state_actions: Vec<Arc<StatePlugin>>,
    bus: Arc<EventBus>,
    runtime_id: String,
}

impl StateMachineInterpreter {
    pub fn new(
        definition: Arc<WorkflowDefinition>,
        initial_state: Option<String>,
        context: Value,
        named_actions: HashMap<String, Arc<dyn StateAction>>,
        state_actions: Vec<Arc<StatePlugin>>,
        bus: Arc<EventBus>,
        runtime_id: String,
    ) -> Result<Self> {
        let current_state = initial_state.unwrap_or_else(|| definition.initial.clone());
        if definition.state(&current_state).is_none() {
            return Err(EngineError::UnknownState(current_state));
        }
        for state in definition.states.values() {
            for transition in state.on.values() {
                if definition.state(transition.target()).is_none() {
                    return Err(EngineError::UnknownState(transition.target().to_string()));
                }
            }
        }

        Ok(StateMachineInterpreter {
            definition,
            current_state,
            context,
            named_actions,
            state_actions,
            bus,
            runtime_id,
        })
    }

    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn set_context(&mut self, context: Value) {
        self.context = context;
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Whether the machine sits in a final state
    pub fn done(&self) -> bool {
        self.definition.is_final_state(&self.current_state)
    }

    /// Tags of the current state
    pub fn current_tags(&self) -> &[String] {
        self.definition
            .state(&self.current_state)
            .map(|state| state.tags.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the machine would accept an event right now, without
    /// evaluating guards
    pub fn accepts(&self, event_type: &str) -> bool {
        event_type == built_in::UPDATE_CONTEXT
            || event_type == built_in::DEEP_MERGE_CONTEXT
            || self
                .definition
                .state(&self.current_state)
                .map(|state| state.on.contains_key(event_type))
                .unwrap_or(false)
    }

    /// Events the machine accepts right now, sorted, built-ins included
    pub fn next_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .definition
            .state(&self.current_state)
            .map(|state| state.on.keys().cloned().collect())
            .unwrap_or_default();
        events.push(built_in::UPDATE_CONTEXT.to_string());
        events.push(built_in::DEEP_MERGE_CONTEXT.to_string());
        events.sort();
        events
    }

    /// Feed one event to the machine
    ///
    /// Built-in context events mutate the context and report no state
    /// change. An event absent from the current state's transition table is
    /// a precondition error. A failing or erroring guard blocks the
    /// transition without erroring; with `assignOnFailure` set it also
    /// raises an EVALUATION_ERROR notification.
    pub async fn send(&mut self, event: &WorkflowEvent) -> Result<TransitionOutcome> {
        if event.event_type == built_in::UPDATE_CONTEXT {
            let payload = event.payload.clone().unwrap_or_else(Value::object);
            self.context = payload.get_path("context").cloned().unwrap_or_else(Value::object);
            return Ok(self.unchanged());
        }
        if event.event_type == built_in::DEEP_MERGE_CONTEXT {
            let payload = event.payload.clone().unwrap_or_else(Value::object);
            let new_context = payload.get_path("newContext").cloned().unwrap_or_else(Value::object);
            let option = payload
                .get_path("arrayMergeOption")
                .and_then(|value| value.parse_into().ok())
                .unwrap_or_default();
            self.context = merge::deep_merge_with_options(&new_context, &self.context, option);
            return Ok(self.unchanged());
        }

        let state = self
            .definition
            .state(&self.current_state)
            .ok_or_else(|| EngineError::UnknownState(self.current_state.clone()))?;

        let transition = state.on.get(&event.event_type).ok_or_else(|| {
            EngineError::Precondition {
                event: event.event_type.clone(),
                state: self.current_state.clone(),
            }
        })?;

        if let Some(guard) = transition.cond() {
            let outcome = GuardEvaluator::evaluate(guard, &self.context, event);
            if !outcome.passed {
                if let GuardSpec::Logic {
                    assign_on_failure: true,
                    ..
                } = guard
                {
                    let notification = Notification::new(notification::EVALUATION_ERROR)
                        .with_state(self.current_state.clone())
                        .with_error(
                            outcome
                                .error
                                .unwrap_or_else(|| "guard condition did not hold".to_string()),
                        );
                    if let Err(error) = self.bus.notify(notification).await {
                        tracing::warn!(%error, "evaluation error notification failed");
                    }
                }
                return Ok(self.unchanged());
            }
        }

        // Targets are checked at construction, so the target state exists.
        let target = transition.target().to_string();
        if target == self.current_state {
            return Ok(self.unchanged());
        }

        let previous_state = self.current_state.clone();
        self.run_state_actions(&previous_state, PluginWhen::Post, event).await;
        self.run_named_actions(&previous_state, true, event).await;

        self.current_state = target.clone();

        self.run_named_actions(&target, false, event).await;
        self.run_state_actions(&target, PluginWhen::Pre, event).await;

        Ok(TransitionOutcome {
            changed: true,
            previous_state,
            new_state: target,
        })
    }

    fn unchanged(&self) -> TransitionOutcome {
        TransitionOutcome {
            changed: false,
            previous_state: self.current_state.clone(),
            new_state: self.current_state.clone(),
        }
    }

    /// Run the definition's entry or exit action list for a state
    async fn run_named_actions(&self, state_name: &str, exit: bool, event: &WorkflowEvent) {
        let Some(state) = self.definition.state(state_name) else {
            return;
        };
        let names = if exit { &state.exit } else { &state.entry };

        for name in names {
            let Some(action) = self.named_actions.get(name) else {
                tracing::debug!(action = %name, state = %state_name, "unregistered action skipped");
                continue;
            };
            let input = StateActionInput {
                workflow_runtime_id: self.runtime_id.clone(),
                state: state_name.to_string(),
                context: self.context.clone(),
                event: event.clone(),
            };
            if let Err(error) = action.run(input).await {
                tracing::warn!(action = %name, state = %state_name, %error, "state action failed");
            }
        }
    }

    /// Run non-blocking state plugins scoped to a state, with status
    /// notifications around each run
    async fn run_state_actions(&self, state_name: &str, when: PluginWhen, event: &WorkflowEvent) {
        for plugin in &self.state_actions {
            if !plugin.applies(state_name, when) {
                continue;
            }

            self.notify_plugin_status(&plugin.name, state_name, ProcessStatus::Pending, None)
                .await;

            let input = StateActionInput {
                workflow_runtime_id: self.runtime_id.clone(),
                state: state_name.to_string(),
                context: self.context.clone(),
                event: event.clone(),
            };
            match plugin.action.run(input).await {
                Ok(()) => {
                    self.notify_plugin_status(&plugin.name, state_name, ProcessStatus::Success, None)
                        .await;
                }
                Err(error) => {
                    tracing::warn!(plugin = %plugin.name, state = %state_name, %error, "state plugin failed");
                    self.notify_plugin_status(
                        &plugin.name,
                        state_name,
                        ProcessStatus::Error,
                        Some(error.to_string()),
                    )
                    .await;
                }
            }
        }
    }

    async fn notify_plugin_status(
        &self,
        plugin_name: &str,
        state_name: &str,
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
            .with_state(state_name.to_string())
            .with_payload(payload);
        if let Some(error) = error {
            notification = notification.with_error(error);
        }
        if let Err(error) = self.bus.notify(notification).await {
            tracing::debug!(%error, "status notification failed");
        }
    }
}

impl std::fmt::Debug for StateMachineInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachineInterpreter")
            .field("current_state", &self.current_state)
            .field("runtime_id", &self.runtime_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interpreter(definition: serde_json::Value, context: serde_json::Value) -> StateMachineInterpreter {
        let definition: WorkflowDefinition = serde_json::from_value(definition).unwrap();
        StateMachineInterpreter::new(
            Arc::new(definition),
            None,
            Value::from(context),
            HashMap::new(),
            Vec::new(),
            Arc::new(EventBus::new()),
            "wf_test".to_string(),
        )
        .unwrap()
    }

    fn simple_definition() -> serde_json::Value {
        json!({
            "id": "kyb",
            "initial": "draft",
            "states": {
                "draft": { "on": { "SUBMIT": "review", "STAY": "draft" } },
                "review": {
                    "on": {
                        "APPROVE": {
                            "target": "approved",
                            "cond": {
                                "type": "json-logic",
                                "rule": { "==": [{ "var": "decision" }, "approve"] }
                            }
                        }
                    }
                },
                "approved": { "type": "final" }
            }
        })
    }

    #[tokio::test]
    async fn test_transition_and_final_state() {
        let mut machine = interpreter(simple_definition(), json!({}));

        let outcome = machine.send(&WorkflowEvent::new("SUBMIT")).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.previous_state, "draft");
        assert_eq!(machine.current_state(), "review");
        assert!(!machine.done());

        let payload = Value::from(json!({ "decision": "approve" }));
        machine
            .send(&WorkflowEvent::new("APPROVE").with_payload(payload))
            .await
            .unwrap();
        assert_eq!(machine.current_state(), "approved");
        assert!(machine.done());
    }

    #[test]
    fn test_dangling_transition_target_rejected_at_construction() {
        let definition: WorkflowDefinition = serde_json::from_value(json!({
            "id": "kyb",
            "initial": "draft",
            "states": {
                "draft": { "on": { "SUBMIT": "review" } }
            }
        }))
        .unwrap();

        let error = StateMachineInterpreter::new(
            Arc::new(definition),
            None,
            Value::object(),
            HashMap::new(),
            Vec::new(),
            Arc::new(EventBus::new()),
            "wf_test".to_string(),
        )
        .unwrap_err();

        assert!(matches!(error, EngineError::UnknownState(state) if state == "review"));
    }

    #[tokio::test]
    async fn test_unknown_event_is_precondition_error() {
        let mut machine = interpreter(simple_definition(), json!({}));

        let error = machine.send(&WorkflowEvent::new("APPROVE")).await.unwrap_err();

        assert!(matches!(error, EngineError::Precondition { .. }));
        assert!(error.to_string().contains("not allowed in the current state"));
    }

    #[tokio::test]
    async fn test_failing_guard_blocks_without_error() {
        let mut machine = interpreter(simple_definition(), json!({}));
        machine.send(&WorkflowEvent::new("SUBMIT")).await.unwrap();

        let outcome = machine
            .send(&WorkflowEvent::new("APPROVE").with_payload(Value::from(json!({ "decision": "reject" }))))
            .await
            .unwrap();

        assert!(!outcome.changed);
        assert_eq!(machine.current_state(), "review");
    }

    #[tokio::test]
    async fn test_self_transition_reports_unchanged() {
        let mut machine = interpreter(simple_definition(), json!({}));

        let outcome = machine.send(&WorkflowEvent::new("STAY")).await.unwrap();

        assert!(!outcome.changed);
        assert_eq!(machine.current_state(), "draft");
    }

    #[tokio::test]
    async fn test_update_context_replaces_wholesale() {
        let mut machine = interpreter(simple_definition(), json!({ "a": 1 }));

        let event = WorkflowEvent::new(built_in::UPDATE_CONTEXT)
            .with_payload(Value::from(json!({ "context": { "b": 2 } })));
        let outcome = machine.send(&event).await.unwrap();

        assert!(!outcome.changed);
        assert_eq!(machine.context(), &Value::from(json!({ "b": 2 })));
    }

    #[tokio::test]
    async fn test_deep_merge_context_built_in_merges_arrays_by_id() {
        let mut machine = interpreter(
            simple_definition(),
            json!({ "documents": [{ "id": "d1", "status": "pending" }] }),
        );

        let event = WorkflowEvent::new(built_in::DEEP_MERGE_CONTEXT).with_payload(Value::from(json!({
            "newContext": { "documents": [{ "id": "d1", "status": "approved" }] }
        })));
        machine.send(&event).await.unwrap();

        assert_eq!(
            machine.context(),
            &Value::from(json!({ "documents": [{ "id": "d1", "status": "approved" }] }))
        );
    }

    #[tokio::test]
    async fn test_next_events_include_built_ins() {
        let machine = interpreter(simple_definition(), json!({}));

        let events = machine.next_events();

        assert!(events.contains(&"SUBMIT".to_string()));
        assert!(events.contains(&built_in::UPDATE_CONTEXT.to_string()));
        assert!(events.contains(&built_in::DEEP_MERGE_CONTEXT.to_string()));
        let mut sorted = events.clone();
        sorted.sort();
        assert_eq!(events, sorted);
    }
}
