//! Error types for haul-tree

use thiserror::Error;

/// Result type for batch model operations
pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Missing required argument 'sorting_pmfms'")]
    MissingSortingPmfms,

    #[error("Batch model not found: {0:?}")]
    ModelNotFound(crate::model::ModelId),

    #[error("Cannot remove the root batch model")]
    RootRemoval,

    #[error(transparent)]
    Batch(#[from] haul_batch::BatchError),

    #[error(transparent)]
    Rule(#[from] haul_rules::RuleError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TreeError {
    fn from(err: serde_json::Error) -> Self {
        TreeError::Serialization(err.to_string())
    }
}
