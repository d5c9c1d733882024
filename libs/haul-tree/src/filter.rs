//! Batch model filters
//!
//! Same conjunctive shape as [`haul_batch::BatchFilter`], evaluated on model nodes:
//! measurement values are read from the node's `original_data`.

use haul_batch::measurement::{MeasurementValues, PmfmId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model::{BatchModel, BatchModelTree, ModelId, ModelRef};

/// Compiled model predicate
pub type ModelPredicate = Box<dyn for<'a> Fn(ModelRef<'a>) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchModelFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_values: Option<MeasurementValues>,
    /// Every listed PMFM must carry a value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmfm_ids: Option<Vec<PmfmId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_leaf: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_filter: Option<Box<BatchModelFilter>>,
}

impl BatchModelFilter {
    pub fn from_object(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_measurement(mut self, pmfm_id: PmfmId, value: impl Into<haul_batch::PmfmValue>) -> Self {
        self.measurement_values
            .get_or_insert_with(MeasurementValues::default)
            .set(pmfm_id, value);
        self
    }

    pub fn with_parent(mut self, parent: BatchModelFilter) -> Self {
        self.parent_filter = Some(Box::new(parent));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.measurement_values.as_ref().map_or(true, MeasurementValues::is_empty)
            && self.pmfm_ids.as_ref().map_or(true, Vec::is_empty)
            && self.is_leaf.is_none()
            && self.hidden.is_none()
            && self.parent_filter.as_ref().map_or(true, |f| f.is_empty())
    }

    pub fn as_filter_fn(&self) -> ModelPredicate {
        let mut terms: Vec<ModelPredicate> = Vec::new();

        if let Some(values) = self.measurement_values.clone().filter(|v| !v.is_empty()) {
            terms.push(Box::new(move |m: ModelRef<'_>| {
                m.model().original_data.measurement_values.matches(&values)
            }));
        }
        if let Some(pmfm_ids) = self.pmfm_ids.clone().filter(|ids| !ids.is_empty()) {
            terms.push(Box::new(move |m: ModelRef<'_>| has_values(m.model(), &pmfm_ids)));
        }
        if let Some(hidden) = self.hidden {
            terms.push(Box::new(move |m: ModelRef<'_>| m.model().hidden == hidden));
        }
        if let Some(is_leaf) = self.is_leaf {
            terms.push(Box::new(move |m: ModelRef<'_>| m.model().is_leaf == is_leaf));
        }
        if let Some(parent_filter) = self.parent_filter.as_deref().filter(|f| !f.is_empty()) {
            let parent_fn = parent_filter.as_filter_fn();
            terms.push(Box::new(move |m: ModelRef<'_>| m.parent().is_some_and(|p| parent_fn(p))));
        }

        match terms.len() {
            0 => Box::new(|_: ModelRef<'_>| true),
            1 => terms.remove(0),
            _ => Box::new(move |m: ModelRef<'_>| terms.iter().all(|term| term(m))),
        }
    }
}

fn has_values(model: &BatchModel, pmfm_ids: &[PmfmId]) -> bool {
    let values = &model.original_data.measurement_values;
    pmfm_ids.iter().all(|id| {
        values
            .get(*id)
            .is_some_and(|v| !matches!(v, haul_batch::PmfmValue::Text(s) if s.trim().is_empty()))
    })
}

/// Matching model nodes, in pre-order
pub fn find_by_filter(tree: &BatchModelTree, filter: &BatchModelFilter) -> Vec<ModelId> {
    let predicate = filter.as_filter_fn();
    tree.iter().filter(|m| predicate(*m)).map(|m| m.id()).collect()
}

/// Remove every matching node with its subtree; the root is never removed
pub fn delete_by_filter(tree: &mut BatchModelTree, filter: &BatchModelFilter) -> Vec<BatchModel> {
    let root = tree.root();
    let mut removed = Vec::new();
    for id in find_by_filter(tree, filter) {
        if id == root || !tree.contains(id) {
            continue;
        }
        if let Ok(model) = tree.remove(id) {
            removed.push(model);
        }
    }
    debug!(removed = removed.len(), "Batch models deleted by filter");
    removed
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::model::BuildOptions;
    use haul_batch::pmfm::QualitativeValue;
    use haul_batch::{Pmfm, PmfmValue};
    use haul_rules::AttributeRuleEvaluator;
    use serde_json::json;

    fn two_level_tree() -> BatchModelTree {
        let dol = Pmfm::qualitative(
            90,
            "DISCARD_OR_LANDING",
            vec![QualitativeValue::new(190, "LAN", "Landing"), QualitativeValue::new(191, "DIS", "Discard")],
        );
        let sorting = Pmfm::qualitative(
            176,
            "BATCH_SORTING",
            vec![QualitativeValue::new(390, "VRAC", "Bulk"), QualitativeValue::new(391, "H-VRAC", "Non bulk")],
        );
        BatchModelTree::build(
            None,
            &[dol, sorting, Pmfm::weight(91, 1)],
            &[],
            &AttributeRuleEvaluator::new(),
            &BuildOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_filter() {
        let tree = two_level_tree();
        let filter = BatchModelFilter::from_object(json!({})).unwrap();
        assert!(filter.is_empty());
        assert_eq!(find_by_filter(&tree, &filter).len(), tree.len());
    }

    #[test]
    fn test_measurement_and_leaf() {
        let tree = two_level_tree();
        let filter = BatchModelFilter::from_object(json!({
            "measurementValues": {"90": "191"},
            "isLeaf": false
        }))
        .unwrap();
        let found = find_by_filter(&tree, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(tree.get(found[0]).unwrap().name.as_deref(), Some("Discard"));
    }

    #[test]
    fn test_parent_filter() {
        let tree = two_level_tree();
        let filter = BatchModelFilter::default()
            .with_measurement(176, PmfmValue::qualitative(390))
            .with_parent(BatchModelFilter::default().with_measurement(90, PmfmValue::qualitative(191)));
        let found = find_by_filter(&tree, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(tree.full_name(found[0]), "Discard > Bulk");
    }

    #[test]
    fn test_pmfm_ids_require_values() {
        let tree = two_level_tree();
        let filter = BatchModelFilter {
            pmfm_ids: Some(vec![90, 176]),
            ..BatchModelFilter::default()
        };
        assert_eq!(find_by_filter(&tree, &filter).len(), 0);

        let filter = BatchModelFilter {
            pmfm_ids: Some(vec![176]),
            ..BatchModelFilter::default()
        };
        assert_eq!(find_by_filter(&tree, &filter).len(), 4);
    }

    #[test]
    fn test_delete_removes_subtrees() {
        let mut tree = two_level_tree();
        assert_eq!(tree.len(), 7);
        let filter = BatchModelFilter::default().with_measurement(90, PmfmValue::qualitative(191));
        let removed = delete_by_filter(&mut tree, &filter);
        assert_eq!(removed.len(), 1);
        assert_eq!(tree.len(), 4);
        assert!(delete_by_filter(&mut tree, &BatchModelFilter::default()).len() == 1);
        assert_eq!(tree.len(), 1);
    }
}
