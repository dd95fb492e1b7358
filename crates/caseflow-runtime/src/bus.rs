//! Host notification bus
//!
//! The runtime publishes notifications (state updates, plugin status
//! updates, evaluation errors, dispatched events) to host subscribers keyed
//! by subscription name. Subscribers are async and may fail; whether a
//! delivery failure matters is the caller's call, so `notify` surfaces it.

use async_trait::async_trait;
use caseflow_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A notification delivered to host subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Notification kind, one of the `caseflow_core::event::notification`
    /// names or a dispatch plugin's event name
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Notification {
    pub fn new(kind: impl Into<String>) -> Self {
        Notification {
            kind: kind.into(),
            state: None,
            payload: None,
            error: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Host-side notification handler
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn handle(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Subscription registry and fan-out
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for a notification kind
    pub async fn subscribe(&self, kind: impl Into<String>, subscriber: Arc<dyn EventSubscriber>) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.entry(kind.into()).or_default().push(subscriber);
    }

    /// Deliver a notification to every subscriber of its kind, in
    /// registration order. The first subscriber failure is returned; later
    /// subscribers still run.
    pub async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        let targets: Vec<Arc<dyn EventSubscriber>> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .get(&notification.kind)
                .cloned()
                .unwrap_or_default()
        };

        let mut first_error = None;
        for subscriber in targets {
            if let Err(error) = subscriber.handle(notification.clone()).await {
                tracing::warn!(kind = %notification.kind, %error, "notification subscriber failed");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}
