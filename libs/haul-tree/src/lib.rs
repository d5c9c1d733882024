//! Batch model tree
//!
//! Projects a catch batch tree through its sorting PMFMs into the model tree driving batch
//! editing: one level per qualitative sorting PMFM, landing and discard branches shaped by
//! the PMFM rule sets.
//!
//! # Key Components
//!
//! - **model**: `BatchModelTree` arena and its recursive construction
//! - **filter**: `BatchModelFilter` with find/delete over model nodes
//! - **builder**: `BatchModelBuilder` adding the landing/discard rules and reshaping the
//!   discard branch

pub mod builder;

pub mod error;

pub mod filter;

pub mod model;

// Re-exports
pub use builder::{BatchModelBuilder, ChildGear, ModelOptions, CATCH_BATCH_NAME};
pub use error::{Result, TreeError};
pub use filter::{delete_by_filter, find_by_filter, BatchModelFilter, ModelPredicate};
pub use model::{
    is_weight_pmfm, BatchModel, BatchModelTree, BuildOptions, ModelId, ModelRef, ModelState, DEFAULT_MAX_TREE_DEPTH,
};
