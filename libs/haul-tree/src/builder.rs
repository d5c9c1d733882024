//! Batch model construction with landing/discard rules
//!
//! [`BatchModelBuilder::create_model`] wraps [`BatchModelTree::build`]:
//!
//! 1. Adds the landing/discard rule sets (or forbids discard PMFMs altogether)
//! 2. Merges the catch PMFMs onto the root and names it
//! 3. Reshapes the discard branch: a split discard node is hidden and its children get the
//!    discard name as prefix; bulk children gain weight and sampling, non-bulk children gain
//!    weight and an exhaustive inventory
//! 4. Drops the discard branch entirely when discards are not allowed

use std::sync::Arc;

use haul_batch::measurement::PmfmId;
use haul_batch::pmfm::QualitativeValue;
use haul_batch::referential::{PmfmIds, QualitativeValueIds};
use haul_batch::{BatchTree, Pmfm, PmfmSchemaProvider, PmfmType, PmfmValue};
use haul_rules::{AttributeRuleEvaluator, BatchRules, ConfigBus, Rule, RuleEvaluator};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, TreeError};
use crate::filter::{delete_by_filter, find_by_filter, BatchModelFilter};
use crate::model::{is_weight_pmfm, BatchModelTree, BuildOptions, DEFAULT_MAX_TREE_DEPTH};

/// Root name when the catch batch has none
pub const CATCH_BATCH_NAME: &str = "Catch";

/// A child gear of the physical gear in use
#[derive(Debug, Clone, PartialEq)]
pub struct ChildGear {
    pub rank_order: u32,
    /// Gear label measurement, preferred over the gear name
    pub gear_label: Option<String>,
    pub gear_name: String,
}

#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub sorting_pmfms: Vec<Pmfm>,
    pub catch_pmfms: Vec<Pmfm>,
    /// Extra rules, evaluated along with the landing/discard ones
    pub rules: Vec<Rule>,
    pub allow_discard: bool,
    pub max_tree_depth: usize,
    /// Turns the CHILD_GEAR PMFM into a qualitative one over these gears
    pub child_gears: Vec<ChildGear>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            sorting_pmfms: Vec::new(),
            catch_pmfms: Vec::new(),
            rules: Vec::new(),
            allow_discard: true,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            child_gears: Vec::new(),
        }
    }
}

impl ModelOptions {
    /// Resolve sorting and catch PMFMs from a schema; unknown ids are skipped
    pub fn from_schema(schema: &dyn PmfmSchemaProvider, sorting_ids: &[PmfmId], catch_ids: &[PmfmId]) -> Self {
        Self {
            sorting_pmfms: schema.pmfms(sorting_ids),
            catch_pmfms: schema.pmfms(catch_ids),
            ..Self::default()
        }
    }
}

/// Builds batch models against the current referential configuration
pub struct BatchModelBuilder {
    bus: ConfigBus,
    batch_rules: BatchRules,
    evaluator: Arc<dyn RuleEvaluator>,
}

impl BatchModelBuilder {
    pub fn new(bus: &ConfigBus) -> Self {
        Self::with_evaluator(bus, Arc::new(AttributeRuleEvaluator::new()))
    }

    pub fn with_evaluator(bus: &ConfigBus, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        Self {
            bus: bus.clone(),
            batch_rules: BatchRules::new(bus),
            evaluator,
        }
    }

    pub fn batch_rules(&self) -> &BatchRules {
        &self.batch_rules
    }

    pub fn create_model(&self, data: Option<&BatchTree>, opts: &ModelOptions) -> Result<BatchModelTree> {
        if opts.sorting_pmfms.is_empty() {
            return Err(TreeError::MissingSortingPmfms);
        }
        let config = self.bus.current();
        let pmfm_ids = config.pmfm_ids;
        let qv_ids = config.qualitative_value_ids;

        let sorting_pmfms: Vec<Pmfm> = opts
            .sorting_pmfms
            .iter()
            .map(|p| fill_child_gear(p, pmfm_ids.child_gear, &opts.child_gears))
            .collect();

        let mut rules = opts.rules.clone();
        if opts.allow_discard {
            rules.push(Rule::precondition(
                "landing",
                move |subject| branch_is(subject, "model", pmfm_ids.discard_or_landing, qv_ids.landing),
                self.batch_rules.get_not_discard_pmfms("pmfm.").to_vec(),
            ));
            rules.push(Rule::precondition(
                "discard",
                move |subject| {
                    branch_is(subject, "model", pmfm_ids.discard_or_landing, qv_ids.discard)
                        || branch_is(&subject["model"], "parent", pmfm_ids.discard_or_landing, qv_ids.discard)
                },
                self.batch_rules.get_not_landing_pmfms("pmfm.").to_vec(),
            ));
        } else {
            rules.extend(self.batch_rules.get_not_discard_pmfms("pmfm.").iter().cloned());
        }

        let build_opts = BuildOptions {
            max_tree_depth: opts.max_tree_depth,
            child_gear_pmfm_id: pmfm_ids.child_gear,
        };
        let mut tree = BatchModelTree::build(data, &sorting_pmfms, &rules, self.evaluator.as_ref(), &build_opts)?;

        let root = tree.root();
        if let Some(model) = tree.get_mut(root) {
            let mut pmfms = opts.catch_pmfms.clone();
            for pmfm in std::mem::take(&mut model.pmfms) {
                if !pmfms.iter().any(|p| p.id == pmfm.id) {
                    pmfms.push(pmfm);
                }
            }
            model.pmfms = pmfms;
            model.disabled = !model.has_visible_pmfm() && !model.is_leaf;
            if model.name.is_none() {
                model.name = Some(CATCH_BATCH_NAME.to_string());
            }
        }

        if opts.allow_discard {
            reshape_discard_branch(&mut tree, &pmfm_ids, &qv_ids);
        } else {
            let discard = BatchModelFilter::default()
                .with_measurement(pmfm_ids.discard_or_landing, PmfmValue::qualitative(qv_ids.discard));
            delete_by_filter(&mut tree, &discard);
        }

        tree.log_tree(None);
        Ok(tree)
    }
}

impl std::fmt::Debug for BatchModelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchModelBuilder")
            .field("batch_rules", &self.batch_rules)
            .finish_non_exhaustive()
    }
}

/// `subject[key].originalData.measurementValues[pmfm_id]` equals the qualitative value
fn branch_is(subject: &Value, key: &str, pmfm_id: PmfmId, qv_id: i32) -> bool {
    let value = &subject[key]["originalData"]["measurementValues"][pmfm_id.to_string().as_str()];
    PmfmValue::from_json(value).is_some_and(|v| v.equals(&PmfmValue::qualitative(qv_id)))
}

fn fill_child_gear(pmfm: &Pmfm, child_gear_id: PmfmId, gears: &[ChildGear]) -> Pmfm {
    if pmfm.id != child_gear_id {
        return pmfm.clone();
    }
    if gears.is_empty() {
        warn!(pmfm = %pmfm.label, "No child gear to fill the PMFM with");
        return pmfm.clone();
    }
    let mut pmfm = pmfm.clone();
    pmfm.pmfm_type = PmfmType::QualitativeValue;
    pmfm.qualitative_values = gears
        .iter()
        .map(|g| {
            let name = g.gear_label.clone().unwrap_or_else(|| g.gear_name.clone());
            QualitativeValue::new(g.rank_order as i32, g.rank_order.to_string(), name)
        })
        .collect();
    pmfm
}

fn reshape_discard_branch(tree: &mut BatchModelTree, pmfm_ids: &PmfmIds, qv_ids: &QualitativeValueIds) {
    let discard = BatchModelFilter::default()
        .with_measurement(pmfm_ids.discard_or_landing, PmfmValue::qualitative(qv_ids.discard));

    let split_discard = BatchModelFilter {
        hidden: Some(false),
        is_leaf: Some(false),
        ..discard.clone()
    };
    for id in find_by_filter(tree, &split_discard) {
        let Some(model) = tree.get_mut(id) else { continue };
        model.pmfms.clear();
        model.state.required_weight = false;
        model.hidden = true;
        let prefix = model.name.clone().unwrap_or_default();
        let children = tree.children(id).to_vec();
        for child in children {
            if let Some(child) = tree.get_mut(child) {
                let name = child.name.clone().unwrap_or_default();
                child.name = Some(format!("{prefix}, {name}"));
            }
        }
    }

    let sorted_below_discard = |qv: i32| {
        BatchModelFilter {
            hidden: Some(false),
            ..BatchModelFilter::default()
        }
        .with_measurement(pmfm_ids.batch_sorting, PmfmValue::qualitative(qv))
        .with_parent(discard.clone())
    };

    for id in find_by_filter(tree, &sorted_below_discard(qv_ids.bulk)) {
        let Some(model) = tree.get_mut(id) else { continue };
        if add_weight_pmfms(&mut model.pmfms, &model.children_pmfms) {
            model.state.show_weight = true;
            model.state.required_weight = true;
            model.state.show_sampling_batch = true;
            model.state.sampling_batch_enabled = true;
        }
    }

    for id in find_by_filter(tree, &sorted_below_discard(qv_ids.non_bulk)) {
        let Some(model) = tree.get_mut(id) else { continue };
        if add_weight_pmfms(&mut model.pmfms, &model.children_pmfms) {
            model.state.show_weight = true;
            model.state.required_weight = true;
            model.state.show_sampling_batch = false;
            model.state.sampling_batch_enabled = false;
            model.state.show_exhaustive_inventory = Some(false);
            model.original_data.exhaustive_inventory = Some(true);
        }
    }

    let visible_leaves = BatchModelFilter {
        hidden: Some(false),
        is_leaf: Some(true),
        ..BatchModelFilter::default()
    };
    for id in find_by_filter(tree, &visible_leaves) {
        if let Some(model) = tree.get_mut(id) {
            model.state.show_exhaustive_inventory.get_or_insert(true);
        }
    }
    debug!("Discard branch reshaped");
}

/// Append the weight PMFMs of `children_pmfms` not already in `pmfms`
fn add_weight_pmfms(pmfms: &mut Vec<Pmfm>, children_pmfms: &[Pmfm]) -> bool {
    let weights: Vec<&Pmfm> = children_pmfms.iter().filter(|p| is_weight_pmfm(p)).collect();
    if weights.is_empty() {
        return false;
    }
    for weight in weights {
        if !pmfms.iter().any(|p| p.id == weight.id) {
            pmfms.push(weight.clone());
        }
    }
    true
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_branch_is() {
        let subject = json!({"model": {
            "originalData": {"measurementValues": {"90": "191"}},
            "parent": {"originalData": {"measurementValues": {"90": {"id": 190, "label": "LAN"}}}}
        }});
        assert!(branch_is(&subject, "model", 90, 191));
        assert!(!branch_is(&subject, "model", 90, 190));
        assert!(branch_is(&subject["model"], "parent", 90, 190));
        assert!(!branch_is(&json!({"model": null}), "model", 90, 191));
    }

    #[test]
    fn test_fill_child_gear() {
        let pmfm = Pmfm::new(400, "CHILD_GEAR", PmfmType::Integer);
        let gears = vec![
            ChildGear {
                rank_order: 1,
                gear_label: Some("Bâbord".to_string()),
                gear_name: "OTT".to_string(),
            },
            ChildGear {
                rank_order: 2,
                gear_label: None,
                gear_name: "OTT".to_string(),
            },
        ];
        let filled = fill_child_gear(&pmfm, 400, &gears);
        assert!(filled.is_qualitative());
        assert_eq!(filled.qualitative_values[0].label, "1");
        assert_eq!(filled.qualitative_values[0].name, "Bâbord");
        assert_eq!(filled.qualitative_values[1].name, "OTT");

        let other = fill_child_gear(&Pmfm::weight(91, 1), 400, &gears);
        assert!(!other.is_qualitative());
    }

    #[test]
    fn test_missing_sorting_pmfms() {
        let builder = BatchModelBuilder::new(&ConfigBus::default());
        let result = builder.create_model(None, &ModelOptions::default());
        assert!(matches!(result, Err(TreeError::MissingSortingPmfms)));
    }
}
