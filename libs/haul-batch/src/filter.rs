//! Batch filters
//!
//! A [`BatchFilter`] is a plain description; [`BatchFilter::as_filter_fn`] compiles it into
//! a conjunctive predicate over tree nodes. Every non-empty field adds one term:
//!
//! 1. `operationId`, `saleId`: exact equality
//! 2. `parentId`: against the in-memory parent's id, falling back to the stored foreign key
//! 3. `isSamplingBatch`: against the derived flag
//! 4. `measurementValues`: each non-null entry must be present and value-equal
//! 5. `parentFilter`: evaluated on the parent; a node without parent fails it
//!
//! An empty filter accepts everything.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::Batch;
use crate::error::Result;
use crate::measurement::MeasurementValues;
use crate::tree::{BatchRef, BatchTree, NodeId};

/// Compiled filter predicate
pub type BatchPredicate = Box<dyn for<'a> Fn(BatchRef<'a>) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_sampling_batch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_values: Option<MeasurementValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_filter: Option<Box<BatchFilter>>,
}

impl BatchFilter {
    /// Build from a plain object such as `{"isSamplingBatch": false}`
    pub fn from_object(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn is_empty(&self) -> bool {
        self.operation_id.is_none()
            && self.sale_id.is_none()
            && self.parent_id.is_none()
            && self.is_sampling_batch.is_none()
            && self.measurement_values.as_ref().map_or(true, MeasurementValues::is_empty)
            && self.parent_filter.as_ref().map_or(true, |f| f.is_empty())
    }

    pub fn as_filter_fn(&self) -> BatchPredicate {
        let mut terms: Vec<BatchPredicate> = Vec::new();

        if let Some(operation_id) = self.operation_id {
            terms.push(Box::new(move |b: BatchRef<'_>| b.batch().operation_id == Some(operation_id)));
        }
        if let Some(sale_id) = self.sale_id {
            terms.push(Box::new(move |b: BatchRef<'_>| b.batch().sale_id == Some(sale_id)));
        }
        if let Some(parent_id) = self.parent_id {
            terms.push(Box::new(move |b: BatchRef<'_>| b.parent_id() == Some(parent_id)));
        }
        if let Some(is_sampling) = self.is_sampling_batch {
            terms.push(Box::new(move |b: BatchRef<'_>| b.batch().is_sampling_batch() == is_sampling));
        }
        if let Some(values) = self.measurement_values.clone().filter(|v| !v.is_empty()) {
            terms.push(Box::new(move |b: BatchRef<'_>| b.batch().measurement_values.matches(&values)));
        }
        if let Some(parent_filter) = self.parent_filter.as_deref().filter(|f| !f.is_empty()) {
            let parent_fn = parent_filter.as_filter_fn();
            terms.push(Box::new(move |b: BatchRef<'_>| b.parent().is_some_and(|p| parent_fn(p))));
        }

        match terms.len() {
            0 => Box::new(|_: BatchRef<'_>| true),
            1 => terms.remove(0),
            _ => Box::new(move |b: BatchRef<'_>| terms.iter().all(|term| term(b))),
        }
    }
}

/// Nodes matching `filter`, in pre-order
pub fn find_by_filter(tree: &BatchTree, filter: &BatchFilter) -> Vec<NodeId> {
    let predicate = filter.as_filter_fn();
    tree.iter().filter(|b| predicate(*b)).map(|b| b.id()).collect()
}

/// Remove every matching node with its subtree; the root is never removed
pub fn delete_by_filter(tree: &mut BatchTree, filter: &BatchFilter) -> Vec<Batch> {
    let root = tree.root();
    let matches = find_by_filter(tree, filter);
    let mut removed = Vec::new();
    for id in matches {
        if id == root || !tree.contains(id) {
            continue;
        }
        if let Ok(batch) = tree.remove(id) {
            removed.push(batch);
        }
    }
    debug!(removed = removed.len(), "Batches deleted by filter");
    removed
}
