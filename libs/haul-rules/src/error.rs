//! Rule engine error types

use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule engine errors
#[derive(Debug, Error)]
pub enum RuleError {
    /// Rule fails its structural check
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Operator unknown or without inverse
    #[error("Operator not implemented yet: {0}")]
    UnsupportedOperator(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::SerializationError(err.to_string())
    }
}

impl RuleError {
    pub fn invalid_rule(message: impl Into<String>) -> Self {
        Self::InvalidRule(message.into())
    }
}
