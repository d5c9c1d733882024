//! Catch batch model
//!
//! A haul's catch is decomposed into a tree of batches: the catch root, sorting batches per
//! landing/discard branch or qualitative criterion, sampling batches (`.%`) and individual
//! batches. This crate owns the entity, its tree and the operations run over it.
//!
//! # Key Components
//!
//! - **batch**: the batch entity and its persisted shape
//! - **label**: structured `LEVEL#n.BRANCH.%` labels
//! - **tree**: arena tree with plain-object conversion in both directions
//! - **rank_order**: per-group rank assignment and label resync
//! - **filter**: conjunctive batch filters with parent filters
//! - **utils**: sampling children, individual counts, weights, cleanup and dumps
//! - **referential**: PMFM, qualitative value, method and quality flag identifiers

pub mod batch;

pub mod error;

pub mod filter;

pub mod label;

pub mod measurement;

pub mod pmfm;

pub mod rank_order;

pub mod referential;

pub mod tree;

pub mod utils;

// Re-exports
pub use batch::{Batch, BatchWeight, TaxonRef, BATCH_TYPENAME};
pub use error::{BatchError, Result};
pub use filter::{delete_by_filter, find_by_filter, BatchFilter, BatchPredicate};
pub use label::{acquisition_level, BatchKind, BatchLabel, SAMPLING_BATCH_SUFFIX};
pub use measurement::{MeasurementValues, PmfmId, PmfmValue};
pub use pmfm::{InMemoryPmfmSchema, Pmfm, PmfmSchemaProvider, PmfmType, QualitativeValue};
pub use rank_order::{compute_rank_order, compute_rank_order_from};
pub use referential::{PmfmIds, QualitativeValueIds};
pub use tree::{BatchObject, BatchRef, BatchTree, NodeId};
