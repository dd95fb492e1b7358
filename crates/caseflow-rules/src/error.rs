//! Rule evaluation error types
//!
//! These errors never cross the engine boundary; `RuleEngine::run` converts
//! every one of them into a FAILED result carrying the error.

use thiserror::Error;

/// Rule evaluation error
#[derive(Error, Debug)]
pub enum RuleError {
    /// Operator name not present in the fixed catalog
    #[error("operator not found: {0}")]
    OperatorNotFound(String),

    /// No value at the rule's data path
    #[error("data value not found at path: {0}")]
    DataValueNotFound(String),

    /// Operand shape rejected by the operator
    #[error("validation failed for operator {operator}: {message}")]
    ValidationFailed { operator: String, message: String },

    /// Threshold missing or out of range for a threshold-aware operator
    #[error("invalid threshold for operator {operator}: {message}")]
    InvalidThreshold { operator: String, message: String },

    /// Named helper not present in the injected helper bag
    #[error("helper not found: {0}")]
    HelperNotFound(String),

    /// A helper call failed
    #[error("helper call failed: {0}")]
    Helper(String),
}

impl RuleError {
    /// Stable error-kind tag carried on FAILED results
    pub fn kind(&self) -> &'static str {
        match self {
            RuleError::OperatorNotFound(_) => "OPERATOR_NOT_FOUND",
            RuleError::DataValueNotFound(_) => "DATA_VALUE_NOT_FOUND",
            RuleError::ValidationFailed { .. } => "VALIDATION_FAILED",
            RuleError::InvalidThreshold { .. } => "INVALID_THRESHOLD",
            RuleError::HelperNotFound(_) => "HELPER_NOT_FOUND",
            RuleError::Helper(_) => "HELPER_FAILED",
        }
    }
}
