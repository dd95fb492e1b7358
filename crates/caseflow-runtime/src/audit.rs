//! Audit log
//!
//! An append-only, in-memory record of everything the engine does while
//! processing events. Logging is opt-in per runtime; when disabled, append
//! calls are no-ops so call sites stay unconditional.

use caseflow_core::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    EventReceived,
    StateTransition,
    PluginInvocation,
    ContextChanged,
    Error,
    Info,
}

/// A single audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub category: AuditCategory,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
}

impl AuditEntry {
    pub fn new(category: AuditCategory, message: impl Into<String>) -> Self {
        AuditEntry {
            category,
            message: message.into(),
            timestamp: Utc::now(),
            metadata: None,
            previous_state: None,
            new_state: None,
            event_name: None,
            plugin_name: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_transition(mut self, previous: impl Into<String>, new: impl Into<String>) -> Self {
        self.previous_state = Some(previous.into());
        self.new_state = Some(new.into());
        self
    }

    pub fn with_event(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = Some(event_name.into());
        self
    }

    pub fn with_plugin(mut self, plugin_name: impl Into<String>) -> Self {
        self.plugin_name = Some(plugin_name.into());
        self
    }
}

/// Append-only audit log, gated on an enabled flag
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    enabled: bool,
}

impl AuditLog {
    pub fn new(enabled: bool) -> Self {
        AuditLog {
            entries: Vec::new(),
            enabled,
        }
    }

    pub fn append(&mut self, entry: AuditEntry) {
        if self.enabled {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_log_discards_entries() {
        let mut log = AuditLog::new(false);
        log.append(AuditEntry::new(AuditCategory::Info, "ignored"));
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_enabled_log_keeps_order() {
        let mut log = AuditLog::new(true);
        log.append(AuditEntry::new(AuditCategory::EventReceived, "first").with_event("SUBMIT"));
        log.append(
            AuditEntry::new(AuditCategory::StateTransition, "second")
                .with_transition("draft", "review"),
        );

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].category, AuditCategory::EventReceived);
        assert_eq!(entries[1].new_state.as_deref(), Some("review"));

        log.clear();
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_category_serialization() {
        let serialized = serde_json::to_string(&AuditCategory::PluginInvocation).unwrap();
        assert_eq!(serialized, "\"PLUGIN_INVOCATION\"");
    }
}
