//! Core error types

use thiserror::Error;

/// Error for core type construction and validation
#[derive(Error, Debug)]
pub enum CoreError {
    /// A definition references a state that does not exist
    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    /// Serialization or deserialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
