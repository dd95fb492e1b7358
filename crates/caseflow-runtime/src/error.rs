//! Runtime error types

use thiserror::Error;

/// Engine error
///
/// `Precondition` is the only variant that crosses the `send_event`
/// boundary at runtime; the remaining variants surface during runtime
/// construction or host-driven invocation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Event not accepted by the current state; no mutation occurred
    #[error("event {event} is not allowed in the current state: {state}")]
    Precondition { event: String, state: String },

    /// A referenced state is missing from the definition; raised at
    /// construction, where every transition target is checked
    #[error("{0} is not defined within the workflow definition's states")]
    UnknownState(String),

    /// Definition failed validation at construction
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// A plugin descriptor could not be turned into a typed plugin
    #[error("plugin configuration error: {0}")]
    PluginConfig(String),

    /// A host-invoked plugin name matched nothing on this runtime
    #[error("plugin {0} is not registered on this workflow")]
    UnknownPlugin(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, EngineError>;
