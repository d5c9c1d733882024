//! Batch model tree
//!
//! The model tree is the editing projection of a catch batch tree. Each sorting PMFM that is
//! qualitative with two or three values (e.g. landing/discard, bulk/non-bulk) opens one
//! level, one child per value; the PMFMs before it stay on the node, the ones after it move
//! to the children. Where no such PMFM remains, the node is a leaf and carries the remaining
//! PMFMs as `children_pmfms`.

use haul_batch::label::{acquisition_level, BatchLabel};
use haul_batch::referential::PmfmIds;
use haul_batch::tree::{BatchTree, NodeId};
use haul_batch::utils::get_sampling_child;
use haul_batch::{Batch, Pmfm};
use haul_rules::{Rule, RuleEvaluator};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::error::{Result, TreeError};

/// Default number of qualitative levels
pub const DEFAULT_MAX_TREE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(usize);

impl ModelId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Editing flags of a model node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelState {
    pub show_weight: bool,
    pub required_weight: bool,
    pub show_sampling_batch: bool,
    pub sampling_batch_enabled: bool,
    pub show_exhaustive_inventory: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BatchModel {
    pub name: Option<String>,
    /// Path of the batch in the nested plain-object shape, e.g. `children.0.children.1`
    pub path: String,
    pub original_data: Batch,
    pub pmfms: Vec<Pmfm>,
    pub children_pmfms: Vec<Pmfm>,
    /// Leaf of the model tree, not of the batch tree
    pub is_leaf: bool,
    pub disabled: bool,
    pub hidden: bool,
    pub state: ModelState,
    parent: Option<ModelId>,
    children: Vec<ModelId>,
}

impl BatchModel {
    fn new(original_data: Batch, path: String, parent: Option<ModelId>) -> Self {
        Self {
            name: None,
            path,
            original_data,
            pmfms: Vec::new(),
            children_pmfms: Vec::new(),
            is_leaf: false,
            disabled: false,
            hidden: false,
            state: ModelState::default(),
            parent,
            children: Vec::new(),
        }
    }

    pub fn has_visible_pmfm(&self) -> bool {
        self.pmfms.iter().any(|p| !p.hidden)
    }

    /// Node PMFMs measuring a weight
    pub fn weight_pmfms(&self) -> Vec<&Pmfm> {
        self.pmfms.iter().filter(|p| is_weight_pmfm(p)).collect()
    }

    /// Plain-object shape handed to rule evaluation
    fn as_rule_model(&self, parent: Option<&BatchModel>) -> Result<Value> {
        let parent = match parent {
            Some(p) => json!({
                "name": p.name,
                "path": p.path,
                "originalData": serde_json::to_value(&p.original_data)?,
            }),
            None => Value::Null,
        };
        Ok(json!({
            "name": self.name,
            "path": self.path,
            "originalData": serde_json::to_value(&self.original_data)?,
            "parent": parent,
        }))
    }
}

/// Weight PMFMs: a weight unit, or a label ending with `WEIGHT`
pub fn is_weight_pmfm(pmfm: &Pmfm) -> bool {
    pmfm.unit_label.as_deref().is_some_and(haul_units::is_weight_unit_symbol)
        || pmfm.label.ends_with("WEIGHT")
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub max_tree_depth: usize,
    /// Never used as a tree level
    pub child_gear_pmfm_id: i32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            child_gear_pmfm_id: PmfmIds::default().child_gear,
        }
    }
}

/// Arena of model nodes
///
/// Filled once by [`BatchModelTree::build`]; removals only empty slots.
#[derive(Debug, Clone)]
pub struct BatchModelTree {
    nodes: Vec<Option<BatchModel>>,
    live: usize,
    root: ModelId,
}

impl BatchModelTree {
    /// Project `data` (or an empty catch batch) through the sorting PMFMs
    ///
    /// At each node the PMFMs rejected by `rules` are dropped first; the rule subject is
    /// `{"pmfm": <pmfm>, "model": <node>}`.
    pub fn build(
        data: Option<&BatchTree>,
        sorting_pmfms: &[Pmfm],
        rules: &[Rule],
        evaluator: &dyn RuleEvaluator,
        opts: &BuildOptions,
    ) -> Result<Self> {
        let mut builder = ModelBuilder {
            data,
            rules,
            evaluator,
            opts,
            nodes: Vec::new(),
        };
        let (source, batch) = match data {
            Some(tree) => (Some(tree.root()), tree.batch(tree.root())?.clone()),
            None => (
                None,
                Batch::with_label(acquisition_level::CATCH_BATCH).with_rank_order(1),
            ),
        };
        let root = builder.build_node(source, batch, sorting_pmfms.to_vec(), 0, None, String::new())?;
        let tree = Self {
            live: builder.nodes.len(),
            nodes: builder.nodes,
            root,
        };
        debug!(models = tree.len(), "Batch model built");
        Ok(tree)
    }

    pub fn root(&self) -> ModelId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ModelId) -> Option<&BatchModel> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut BatchModel> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn model(&self, id: ModelId) -> Result<&BatchModel> {
        self.get(id).ok_or(TreeError::ModelNotFound(id))
    }

    pub fn parent(&self, id: ModelId) -> Option<ModelId> {
        self.get(id).and_then(|m| m.parent)
    }

    pub fn children(&self, id: ModelId) -> &[ModelId] {
        self.get(id).map(|m| m.children.as_slice()).unwrap_or(&[])
    }

    pub fn view(&self, id: ModelId) -> Option<ModelRef<'_>> {
        self.get(id).map(|model| ModelRef {
            tree: self,
            id,
            model,
        })
    }

    /// Pre-order ids of the subtree at `from`
    pub fn depth_first(&self, from: ModelId) -> Vec<ModelId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if !self.contains(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    pub fn iter(&self) -> impl Iterator<Item = ModelRef<'_>> {
        self.depth_first(self.root)
            .into_iter()
            .filter_map(move |id| self.view(id))
    }

    /// Names from the root down, skipping hidden ancestors, joined by ` > `
    pub fn full_name(&self, id: ModelId) -> String {
        let name = self.get(id).and_then(|m| m.name.clone()).unwrap_or_default();
        match self.parent(id) {
            Some(parent) if self.get(parent).is_some_and(|p| !p.hidden) => {
                format!("{} > {}", self.full_name(parent), name)
            },
            _ => name,
        }
    }

    /// Remove a node with its subtree
    pub fn remove(&mut self, id: ModelId) -> Result<BatchModel> {
        if id == self.root {
            return Err(TreeError::RootRemoval);
        }
        if !self.contains(id) {
            return Err(TreeError::ModelNotFound(id));
        }
        if let Some(parent) = self.parent(id).and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        let subtree = self.depth_first(id);
        let mut removed = None;
        for node in subtree {
            let taken = self.nodes.get_mut(node.0).and_then(Option::take);
            if taken.is_some() {
                self.live -= 1;
            }
            if node == id {
                removed = taken;
            }
        }
        removed.ok_or(TreeError::ModelNotFound(id))
    }

    /// Indented dump, one ` - name: PMFM labels` line per node
    pub fn log_tree(&self, mut sink: Option<&mut dyn FnMut(&str)>) {
        let mut stack = vec![(self.root, String::new())];
        while let Some((id, indent)) = stack.pop() {
            let Some(model) = self.get(id) else { continue };
            let mut line = if id == self.root {
                "Catch".to_string()
            } else {
                model
                    .name
                    .clone()
                    .unwrap_or_else(|| model.original_data.label_text())
            };
            let labels: Vec<&str> = model.pmfms.iter().map(|p| p.label.as_str()).collect();
            if !labels.is_empty() {
                line.push_str(": ");
                line.push_str(&labels.join(", "));
            }
            if model.hidden {
                line.push_str(" (hidden)");
            }
            let line = format!("{indent} - {line}");
            match sink.as_deref_mut() {
                Some(sink) => sink(&line),
                None => debug!("{line}"),
            }
            for child in self.children(id).iter().rev() {
                stack.push((*child, format!("{indent}\t")));
            }
        }
    }

    /// Collect [`BatchModelTree::log_tree`] output
    pub fn tree_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut push = |line: &str| lines.push(line.to_string());
        self.log_tree(Some(&mut push));
        lines
    }
}

/// Borrowed view of one model node
#[derive(Debug, Clone, Copy)]
pub struct ModelRef<'a> {
    tree: &'a BatchModelTree,
    id: ModelId,
    model: &'a BatchModel,
}

impl<'a> ModelRef<'a> {
    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn model(&self) -> &'a BatchModel {
        self.model
    }

    pub fn parent(&self) -> Option<ModelRef<'a>> {
        self.tree.parent(self.id).and_then(|p| self.tree.view(p))
    }

    pub fn children(&self) -> impl Iterator<Item = ModelRef<'a>> + 'a {
        let tree = self.tree;
        tree.children(self.id).iter().filter_map(move |c| tree.view(*c))
    }

    pub fn full_name(&self) -> String {
        self.tree.full_name(self.id)
    }
}

// ============================================================================
// Construction
// ============================================================================

struct ModelBuilder<'a> {
    data: Option<&'a BatchTree>,
    rules: &'a [Rule],
    evaluator: &'a dyn RuleEvaluator,
    opts: &'a BuildOptions,
    nodes: Vec<Option<BatchModel>>,
}

impl ModelBuilder<'_> {
    fn node(&self, id: ModelId) -> Result<&BatchModel> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(TreeError::ModelNotFound(id))
    }

    fn node_mut(&mut self, id: ModelId) -> Result<&mut BatchModel> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::ModelNotFound(id))
    }

    fn accepted_pmfms(&self, id: ModelId, pmfms: Vec<Pmfm>) -> Result<Vec<Pmfm>> {
        if self.rules.is_empty() {
            return Ok(pmfms);
        }
        let node = self.node(id)?;
        let parent = node.parent.map(|p| self.node(p)).transpose()?;
        let model = node.as_rule_model(parent)?;

        let mut accepted = Vec::with_capacity(pmfms.len());
        for pmfm in pmfms {
            let subject = json!({"pmfm": serde_json::to_value(&pmfm)?, "model": model});
            if self.evaluator.valid(&subject, self.rules) {
                accepted.push(pmfm);
            } else {
                trace!(path = %node.path, pmfm = %pmfm.label, "PMFM rejected by rules");
            }
        }
        Ok(accepted)
    }

    fn first_level_pmfm(&self, pmfms: &[Pmfm]) -> Option<usize> {
        pmfms.iter().position(|p| {
            p.is_qualitative()
                && !p.hidden
                && (2..=3).contains(&p.qualitative_values.len())
                && p.id != self.opts.child_gear_pmfm_id
        })
    }

    /// Existing batch below `source` (or its sampling child) holding `qv` for `pmfm`
    fn find_child_batch(
        &self,
        source: Option<NodeId>,
        sampling: Option<NodeId>,
        pmfm: &Pmfm,
        qv_id: i32,
    ) -> Option<NodeId> {
        let tree = self.data?;
        let holder = sampling.or(source)?;
        let expected = haul_batch::PmfmValue::qualitative(qv_id);
        tree.children(holder).iter().copied().find(|c| {
            tree.get(*c)
                .and_then(|b| b.measurement_values.get(pmfm.id))
                .is_some_and(|v| v.equals(&expected))
        })
    }

    fn build_node(
        &mut self,
        source: Option<NodeId>,
        batch: Batch,
        pmfms: Vec<Pmfm>,
        depth: usize,
        parent: Option<ModelId>,
        path: String,
    ) -> Result<ModelId> {
        let is_catch =
            depth == 0 || batch.label.as_ref().is_some_and(|l| l.level == acquisition_level::CATCH_BATCH);

        let id = ModelId(self.nodes.len());
        self.nodes.push(Some(BatchModel::new(batch, path, parent)));

        let pmfms = self.accepted_pmfms(id, pmfms)?;
        let mut node_pmfms = Vec::new();
        let mut children_pmfms = Vec::new();
        let mut children = Vec::new();

        match self.first_level_pmfm(&pmfms) {
            Some(index) => {
                node_pmfms = pmfms[..index].to_vec();
                let level_pmfm = pmfms[index].clone();
                let rest = pmfms[index + 1..].to_vec();

                if depth + 1 < self.opts.max_tree_depth && !rest.is_empty() {
                    let sampling = match (self.data, source) {
                        (Some(tree), Some(node)) => get_sampling_child(tree, node),
                        _ => None,
                    };
                    let current = self.node(id)?;
                    let path = current.path.clone();
                    let prefix = if is_catch {
                        format!("{}#", acquisition_level::SORTING_BATCH)
                    } else {
                        let carrier = sampling
                            .and_then(|s| self.data.and_then(|t| t.get(s)))
                            .map(Batch::label_text)
                            .unwrap_or_else(|| current.original_data.label_text());
                        format!("{carrier}.")
                    };
                    let children_path = match (is_catch, sampling) {
                        (true, _) => "children".to_string(),
                        (false, Some(_)) => format!("{path}.children.0.children"),
                        (false, None) => format!("{path}.children"),
                    };

                    for (index, qv) in level_pmfm.qualitative_values.iter().enumerate() {
                        let mut child_pmfm = level_pmfm.clone();
                        child_pmfm.hidden = true;
                        child_pmfm.default_value = Some(qv.as_value());

                        let existing = self.find_child_batch(source, sampling, &level_pmfm, qv.id);
                        let existing_batch = existing.and_then(|c| self.data.and_then(|t| t.get(c)));
                        let mut child_batch = match existing_batch {
                            Some(b) => b.clone(),
                            None => {
                                let mut b = Batch::default();
                                b.measurement_values
                                    .set(level_pmfm.id, haul_batch::PmfmValue::qualitative(qv.id));
                                b
                            },
                        };
                        child_batch.label = Some(BatchLabel::parse(&format!("{prefix}{}", qv.label)));
                        child_batch.rank_order = Some(index as u32 + 1);

                        let child = self.build_node(
                            existing,
                            child_batch,
                            rest.clone(),
                            depth + 1,
                            Some(id),
                            format!("{children_path}.{index}"),
                        )?;
                        let child_node = self.node_mut(child)?;
                        child_node.pmfms.insert(0, child_pmfm);
                        child_node.name = Some(qv.name.clone());
                        children.push(child);
                    }
                } else {
                    children_pmfms.push(level_pmfm);
                    children_pmfms.extend(rest);
                }
            },
            None => children_pmfms = pmfms,
        }

        let node = self.node_mut(id)?;
        let no_visible = !node_pmfms.iter().any(|p| !p.hidden);
        node.is_leaf = children.is_empty() || !children_pmfms.is_empty();
        node.hidden = no_visible && parent.is_none();
        node.disabled = no_visible && !node.is_leaf && parent.is_none();
        node.pmfms = node_pmfms;
        node.children_pmfms = children_pmfms;
        node.children = children;
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use haul_batch::pmfm::{PmfmType, QualitativeValue};
    use haul_rules::AttributeRuleEvaluator;
    use tracing_test::traced_test;

    fn discard_or_landing() -> Pmfm {
        Pmfm::qualitative(
            90,
            "DISCARD_OR_LANDING",
            vec![
                QualitativeValue::new(190, "LAN", "Landing"),
                QualitativeValue::new(191, "DIS", "Discard"),
            ],
        )
    }

    fn build(data: Option<&BatchTree>, pmfms: &[Pmfm]) -> BatchModelTree {
        BatchModelTree::build(data, pmfms, &[], &AttributeRuleEvaluator::new(), &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_no_qualitative_pmfm_gives_leaf_root() {
        let weight = Pmfm::weight(91, 1);
        let tree = build(None, &[weight]);
        let root = tree.get(tree.root()).unwrap();
        assert!(root.is_leaf);
        assert!(root.pmfms.is_empty());
        assert_eq!(root.children_pmfms.len(), 1);
        assert_eq!(root.original_data.label_text(), "CATCH_BATCH");
        assert!(root.hidden);
        assert!(!root.disabled);
    }

    #[test]
    fn test_one_level_per_qualitative_pmfm() {
        let total = Pmfm::new(81, "LENGTH_TOTAL_CM", PmfmType::Double);
        let tree = build(None, &[discard_or_landing(), Pmfm::weight(91, 1), total]);

        let root = tree.root();
        assert_eq!(tree.children(root).len(), 2);
        let root_model = tree.get(root).unwrap();
        assert!(!root_model.is_leaf);
        assert!(root_model.disabled);

        let lan = tree.get(tree.children(root)[0]).unwrap();
        assert_eq!(lan.original_data.label_text(), "SORTING_BATCH#LAN");
        assert_eq!(lan.original_data.rank_order, Some(1));
        assert_eq!(lan.path, "children.0");
        assert_eq!(lan.name.as_deref(), Some("Landing"));
        assert!(lan.is_leaf);
        assert_eq!(lan.pmfms.len(), 1);
        assert!(lan.pmfms[0].hidden);
        assert_eq!(lan.children_pmfms.len(), 2);
        assert!(lan.original_data.measurement_values.contains(90));
    }

    #[test]
    fn test_existing_batches_are_reused() {
        let mut data = BatchTree::new(Batch::with_label("CATCH_BATCH").with_id(1));
        let root = data.root();
        let mut dis = Batch::with_label("SORTING_BATCH#2").with_id(7);
        dis.measurement_values.set(90, haul_batch::PmfmValue::from("191"));
        data.add_child(root, dis).unwrap();

        let tree = build(Some(&data), &[discard_or_landing(), Pmfm::weight(91, 1)]);
        let children = tree.children(tree.root());
        assert_eq!(tree.get(children[0]).unwrap().original_data.id, None);
        let discard = tree.get(children[1]).unwrap();
        assert_eq!(discard.original_data.id, Some(7));
        assert_eq!(discard.original_data.label_text(), "SORTING_BATCH#DIS");
    }

    #[test]
    fn test_full_name_skips_hidden_root() {
        let tree = build(None, &[discard_or_landing(), Pmfm::weight(91, 1)]);
        let lan = tree.children(tree.root())[0];
        assert_eq!(tree.full_name(lan), "Landing");
    }

    #[test]
    fn test_max_depth_stops_splitting() {
        let opts = BuildOptions {
            max_tree_depth: 1,
            ..BuildOptions::default()
        };
        let tree = BatchModelTree::build(
            None,
            &[discard_or_landing(), Pmfm::weight(91, 1)],
            &[],
            &AttributeRuleEvaluator::new(),
            &opts,
        )
        .unwrap();
        let root = tree.get(tree.root()).unwrap();
        assert!(tree.children(tree.root()).is_empty());
        assert_eq!(root.children_pmfms[0].id, 90);
    }

    #[test]
    fn test_remove_and_log() {
        let mut tree = build(None, &[discard_or_landing(), Pmfm::weight(91, 1)]);
        assert_eq!(
            tree.tree_lines(),
            vec![
                " - Catch (hidden)".to_string(),
                "\t - Landing: DISCARD_OR_LANDING".to_string(),
                "\t - Discard: DISCARD_OR_LANDING".to_string(),
            ]
        );

        let dis = tree.children(tree.root())[1];
        let removed = tree.remove(dis).unwrap();
        assert_eq!(removed.name.as_deref(), Some("Discard"));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.iter().count(), 2);
        assert!(matches!(tree.remove(dis), Err(TreeError::ModelNotFound(_))));
        assert_eq!(tree.len(), 2);
        assert!(matches!(tree.remove(tree.root()), Err(TreeError::RootRemoval)));
    }

    #[test]
    #[traced_test]
    fn test_log_tree_defaults_to_tracing() {
        let tree = build(None, &[discard_or_landing(), Pmfm::weight(91, 1)]);
        tree.log_tree(None);
        assert!(logs_contain("- Discard: DISCARD_OR_LANDING"));
    }
}
