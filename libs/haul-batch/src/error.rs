//! Error types for haul-batch

use crate::tree::NodeId;
use thiserror::Error;

/// Result type for batch tree operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Batch model errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// Arena slot is empty or out of range
    #[error("Batch node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// A parent must carry an id before its subtree can be flattened
    #[error("Cannot convert batch tree into array: no id found for batch {label}")]
    MissingParentId { label: String },

    /// Sampling ratio outside [0, 1]
    #[error("Invalid sampling ratio: {0} (expected a value in [0, 1])")]
    InvalidSamplingRatio(f64),

    /// The root owns the whole tree and cannot be detached
    #[error("Cannot remove the root batch")]
    RootRemoval,

    /// Moving a node below itself or one of its descendants
    #[error("Cannot move batch {0:?} below its own subtree")]
    CyclicMove(NodeId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Units(#[from] haul_units::UnitsError),
}

impl From<serde_json::Error> for BatchError {
    fn from(err: serde_json::Error) -> Self {
        BatchError::Serialization(err.to_string())
    }
}

impl BatchError {
    pub fn missing_parent_id(label: impl Into<String>) -> Self {
        Self::MissingParentId { label: label.into() }
    }
}
