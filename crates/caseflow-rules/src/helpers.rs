//! Injected helper seam
//!
//! Some operators need host data access (e.g. a similarity-scoring service).
//! Rather than reaching out itself, the engine receives a bag of named async
//! lookup functions; this is its sole dependency-injection seam into host
//! data access.

use crate::error::RuleError;
use async_trait::async_trait;
use caseflow_core::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Well-known helper names
pub mod names {
    /// Scores the similarity of two entity names; called with
    /// `{ "value": .., "comparisonValue": .. }`, expected to return
    /// `{ "similarityScore": <0..100> }`
    pub const ENTITY_MATCHING: &str = "entityMatching";
}

/// A named async lookup function provided by the host
#[async_trait]
pub trait RuleHelper: Send + Sync {
    async fn call(&self, args: Value) -> anyhow::Result<Value>;
}

/// Bag of named helpers passed to every evaluation
#[derive(Default, Clone)]
pub struct Helpers {
    map: HashMap<String, Arc<dyn RuleHelper>>,
}

impl Helpers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a helper under a name, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, helper: Arc<dyn RuleHelper>) {
        self.map.insert(name.into(), helper);
    }

    /// Builder-style registration
    pub fn with(mut self, name: impl Into<String>, helper: Arc<dyn RuleHelper>) -> Self {
        self.insert(name, helper);
        self
    }

    /// Look up a helper, erroring if absent
    pub fn get(&self, name: &str) -> Result<&Arc<dyn RuleHelper>, RuleError> {
        self.map
            .get(name)
            .ok_or_else(|| RuleError::HelperNotFound(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Helpers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Helpers")
            .field("names", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}
