//! Shared fixtures for runtime integration tests

use async_trait::async_trait;
use caseflow_core::{Value, WorkflowDefinition, WorkflowExtensions};
use caseflow_runtime::{
    EventSubscriber, HttpRequest, HttpResponse, HttpTransport, Notification, StateAction,
    StateActionInput, TokenIssueRequest, WorkflowTokenAction,
};
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn definition(json: serde_json::Value) -> WorkflowDefinition {
    serde_json::from_value(json).unwrap()
}

pub fn extensions(json: serde_json::Value) -> WorkflowExtensions {
    serde_json::from_value(json).unwrap()
}

pub fn value(json: serde_json::Value) -> Value {
    Value::from(json)
}

/// The review flow used across most tests
pub fn review_definition() -> WorkflowDefinition {
    definition(serde_json::json!({
        "id": "kyb_review",
        "initial": "draft",
        "states": {
            "draft": { "on": { "SUBMIT": "review" } },
            "review": {
                "on": {
                    "APPROVE": "approved",
                    "DONE": "done",
                    "VENDOR_DONE": "approved",
                    "VENDOR_FAILED": "failed"
                }
            },
            "approved": { "type": "final" },
            "done": { "type": "final" },
            "failed": { "type": "final", "tags": ["failure"] }
        }
    }))
}

/// Subscriber that records every notification it receives
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<Notification>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|notification| notification.kind.clone())
            .collect()
    }
}

#[async_trait]
impl EventSubscriber for Recorder {
    async fn handle(&self, notification: Notification) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Transport replaying scripted responses in order
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<(u16, Value)>>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<(u16, serde_json::Value)>) -> Self {
        ScriptedTransport {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|(status, body)| (status, Value::from(body)))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted response left"))?;
        Ok(HttpResponse { status, body })
    }
}

/// Token action replying with a fixed value
pub struct FixedToken(pub serde_json::Value);

#[async_trait]
impl WorkflowTokenAction for FixedToken {
    async fn issue(&self, _request: TokenIssueRequest) -> anyhow::Result<Value> {
        Ok(Value::from(self.0.clone()))
    }
}

/// Token action that always fails
pub struct FailingToken;

#[async_trait]
impl WorkflowTokenAction for FailingToken {
    async fn issue(&self, _request: TokenIssueRequest) -> anyhow::Result<Value> {
        anyhow::bail!("token service unavailable")
    }
}

/// State action recording the states it ran in
#[derive(Default)]
pub struct RecordingAction {
    pub runs: Mutex<Vec<String>>,
}

#[async_trait]
impl StateAction for RecordingAction {
    async fn run(&self, input: StateActionInput) -> anyhow::Result<()> {
        self.runs.lock().unwrap().push(input.state);
        Ok(())
    }
}

/// State action that always fails
pub struct FailingAction;

#[async_trait]
impl StateAction for FailingAction {
    async fn run(&self, _input: StateActionInput) -> anyhow::Result<()> {
        anyhow::bail!("downstream system rejected the update")
    }
}
