//! Batch tree utilities: sampling children, individual counts, weights, cleanup and dumps

use tracing::{debug, warn};

use crate::batch::{Batch, BatchWeight};
use crate::error::{BatchError, Result};
use crate::label::{acquisition_level, BatchLabel};
use crate::pmfm::Pmfm;
use crate::referential::{method_ids, quality_flag_ids, PmfmIds, QualitativeValueIds};
use crate::tree::{BatchRef, BatchTree, NodeId};

// ============================================================================
// Sampling children
// ============================================================================

fn sampling_label_of(tree: &BatchTree, parent: NodeId) -> BatchLabel {
    let parent_label = tree
        .get(parent)
        .and_then(|b| b.label.clone())
        .unwrap_or_default();
    BatchLabel::sampling_of(&parent_label)
}

/// The child labelled `<parent label>.%`
pub fn get_sampling_child(tree: &BatchTree, parent: NodeId) -> Option<NodeId> {
    let label = sampling_label_of(tree, parent);
    tree.children(parent)
        .iter()
        .copied()
        .find(|c| tree.get(*c).and_then(|b| b.label.as_ref()) == Some(&label))
}

/// The sampling child of `parent`, created if missing
///
/// A new sampling child adopts every existing child of `parent` and becomes its only child.
pub fn get_or_create_sampling_child(tree: &mut BatchTree, parent: NodeId) -> Result<NodeId> {
    if let Some(existing) = get_sampling_child(tree, parent) {
        return Ok(existing);
    }
    if !tree.contains(parent) {
        return Err(BatchError::NodeNotFound(parent));
    }
    let sampling = Batch {
        label: Some(sampling_label_of(tree, parent)),
        rank_order: Some(1),
        ..Batch::default()
    };
    tree.wrap_children(parent, sampling)
}

// ============================================================================
// Level lookups
// ============================================================================

/// Nearest descendants whose label starts with `<level>#`
///
/// A matching child is returned without looking below it.
pub fn children_by_level(tree: &BatchTree, node: NodeId, level: &str) -> Vec<NodeId> {
    let mut found = Vec::new();
    for child in tree.children(node) {
        if tree.get(*child).is_some_and(|b| b.has_level(level)) {
            found.push(*child);
        } else {
            found.extend(children_by_level(tree, *child, level));
        }
    }
    found
}

pub fn has_children_with_level(tree: &BatchTree, node: NodeId, level: &str) -> bool {
    tree.children(node).iter().any(|child| {
        tree.get(*child).is_some_and(|b| b.has_level(level))
            || has_children_with_level(tree, *child, level)
    })
}

// ============================================================================
// Individual counts
// ============================================================================

/// Derive individual counts from individual batches, bottom-up
///
/// - a sampling batch takes the sum of its individual children
/// - a sorting batch whose count is lower than that sum is flagged bad
/// - a sorting batch without count, or with a larger one, gets a sampling child holding the
///   sum (the existing children move below it)
pub fn compute_individual_count(tree: &mut BatchTree, node: NodeId) {
    let Some(batch) = tree.get(node) else { return };
    if batch.label.is_none() || tree.children(node).is_empty() {
        return;
    }

    let mut sum: Option<u32> = None;
    for child in tree.children(node).to_vec() {
        compute_individual_count(tree, child);
        if let Some(child_batch) = tree.get(child).filter(|b| b.is_individual()) {
            let total = sum.get_or_insert(0);
            let count = child_batch.individual_count.unwrap_or(1);
            *total = total.checked_add(count).unwrap_or_else(|| {
                warn!(batch = %child_batch.label_text(), "Individual count overflow, saturating");
                u32::MAX
            });
        }
    }

    let Some(batch) = tree.get(node) else { return };
    let label = batch.label_text();

    if batch.is_sampling_batch() {
        let count = sum.filter(|s| *s > 0);
        if let Some(batch) = tree.get_mut(node) {
            batch.individual_count = count;
        }
        return;
    }

    let Some(sum) = sum else { return };
    let is_sorting = batch
        .label
        .as_ref()
        .is_some_and(|l| l.level.starts_with(acquisition_level::SORTING_BATCH));
    if !is_sorting {
        return;
    }

    let current = batch.individual_count;
    match current {
        Some(count) if count < sum => {
            warn!(
                batch = %label,
                individual_count = count,
                children_count = sum,
                "Individual count lower than the sum of its children"
            );
            if let Some(batch) = tree.get_mut(node) {
                batch.quality_flag_id = Some(quality_flag_ids::BAD);
            }
        },
        Some(count) if count == sum => {},
        _ => {
            let sampling = Batch {
                label: Some(sampling_label_of(tree, node)),
                rank_order: Some(1),
                individual_count: Some(sum),
                ..Batch::default()
            };
            if tree.wrap_children(node, sampling).is_ok() {
                debug!(batch = %label, individual_count = sum, "Sampling batch created");
            }
        },
    }
}

/// Observed individuals below the given nodes: leaves count only when they are individual
/// batches (default 1 each)
pub fn sum_observed_individual_count(tree: &BatchTree, nodes: &[NodeId]) -> u32 {
    nodes
        .iter()
        .map(|id| {
            let children = tree.children(*id);
            if !children.is_empty() {
                sum_observed_individual_count(tree, children)
            } else {
                tree.get(*id)
                    .filter(|b| b.is_individual())
                    .map_or(0, |b| b.individual_count.unwrap_or(1))
            }
        })
        .fold(0, u32::saturating_add)
}

// ============================================================================
// Emptiness
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyOptions {
    pub ignore_children: bool,
    pub ignore_taxon: bool,
}

/// No data of its own and (unless ignored) no non-empty child
pub fn is_empty(tree: &BatchTree, node: NodeId, opts: EmptyOptions) -> bool {
    let Some(batch) = tree.get(node) else { return true };
    if batch.has_data(!opts.ignore_taxon) {
        return false;
    }
    opts.ignore_children || tree.children(node).iter().all(|c| is_empty(tree, *c, opts))
}

/// Remove empty leaves recursively; returns whether `node` itself ended up empty
///
/// The node itself is kept even when empty; its parent decides.
pub fn clean_tree(tree: &mut BatchTree, node: NodeId) -> bool {
    for child in tree.children(node).to_vec() {
        if clean_tree(tree, child) {
            if let Err(err) = tree.remove(child) {
                debug!(%err, "Cannot remove empty batch");
            }
        }
    }
    tree.children(node).is_empty()
        && is_empty(
            tree,
            node,
            EmptyOptions {
                ignore_children: true,
                ignore_taxon: true,
            },
        )
}

// ============================================================================
// Weights
// ============================================================================

/// Weight PMFMs in preference order
pub fn default_weight_pmfms(ids: &PmfmIds) -> Vec<Pmfm> {
    let mut calculated_weight_length =
        Pmfm::weight(ids.batch_calculated_weight_length, method_ids::CALCULATED_WEIGHT_LENGTH);
    calculated_weight_length.maximum_number_decimals = Some(6);

    vec![
        Pmfm::weight(ids.batch_measured_weight, method_ids::MEASURED_BY_OBSERVER),
        Pmfm::weight(ids.batch_estimated_weight, method_ids::ESTIMATED_BY_OBSERVER),
        Pmfm::weight(ids.batch_calculated_weight, method_ids::CALCULATED),
        calculated_weight_length,
        Pmfm::weight(ids.batch_calculated_weight_length_sum, method_ids::CALCULATED_WEIGHT_LENGTH_SUM),
    ]
}

/// Best weight of a batch
///
/// An explicit `weight` wins. Otherwise every weight PMFM holding a number is a candidate;
/// measured beats computed, then observed beats estimated, then PMFM order breaks ties.
pub fn get_weight(batch: &Batch, weight_pmfms: &[Pmfm]) -> Option<BatchWeight> {
    if let Some(weight) = &batch.weight {
        return Some(weight.clone());
    }

    let mut best: Option<(u8, BatchWeight)> = None;
    for pmfm in weight_pmfms {
        let Some(value) = batch
            .measurement_values
            .get(pmfm.id)
            .and_then(|v| v.as_f64())
            .filter(|v| !v.is_nan())
        else {
            continue;
        };
        let weight = BatchWeight {
            value,
            unit: pmfm.unit_label.clone(),
            method_id: pmfm.method_id,
            computed: pmfm.is_computed,
            estimated: pmfm.is_estimated(),
        };
        let rank = 10 * u8::from(!weight.computed) + u8::from(!weight.estimated);
        if best.as_ref().map_or(true, |(r, _)| rank > *r) {
            best = Some((rank, weight));
        }
    }
    best.map(|(_, weight)| weight)
}

// ============================================================================
// Tree dump
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct LogTreeOptions {
    pub show_parent: bool,
    pub show_taxon: bool,
    pub show_measure: bool,
    pub pmfm_ids: PmfmIds,
    pub qualitative_value_ids: QualitativeValueIds,
}

impl LogTreeOptions {
    pub fn all() -> Self {
        Self {
            show_parent: true,
            show_taxon: true,
            show_measure: true,
            ..Self::default()
        }
    }
}

fn describe(node: BatchRef<'_>, opts: &LogTreeOptions) -> String {
    let batch = node.batch();
    let mut line = match batch.label_text() {
        label if label.is_empty() => "NO_LABEL".to_string(),
        label => label,
    };

    if let Some(id) = batch.id {
        line.push_str(&format!(" id:{id}"));
    }

    if opts.show_parent {
        if let Some(parent) = node.parent().map(|p| p.batch()) {
            match (parent.id, &parent.label) {
                (Some(id), _) => line.push_str(&format!(" parent.id:{id}")),
                (None, Some(label)) => line.push_str(&format!(" parent.label:{label}")),
                _ => {},
            }
        }
        if let Some(parent_id) = batch.parent_id {
            line.push_str(&format!(" parentId:{parent_id}"));
        }
    }

    if opts.show_taxon {
        if let Some(taxon_group) = batch.taxon_group.as_ref().filter(|t| !t.is_empty()) {
            line.push_str(&format!(" taxonGroup:{}", taxon_group.display_label()));
        }
        if let Some(taxon_name) = batch.taxon_name.as_ref().filter(|t| !t.is_empty()) {
            line.push_str(&format!(" taxonName:{}", taxon_name.display_label()));
        }
    }

    if opts.show_measure {
        let ids = &opts.pmfm_ids;
        let qv = &opts.qualitative_value_ids;
        let values = &batch.measurement_values;

        if let Some(position) = values.get(ids.batch_gear_position) {
            let side = if position.qualitative_id() == Some(qv.gear_position_port) { "B" } else { "T" };
            line.push_str(&format!(" gearPosition:{side}"));
        }
        if let Some(dol) = values.get(ids.discard_or_landing) {
            let branch = if dol.qualitative_id() == Some(qv.landing) { "LAN" } else { "DIS" };
            line.push_str(&format!(" discardOrLanding:{branch}"));
        }
        if let Some(length) = values.get(ids.length_total_cm) {
            line.push_str(&format!(" length:{length}cm"));
        }
        if let Some(weight) = values
            .get(ids.batch_measured_weight)
            .or_else(|| values.get(ids.batch_estimated_weight))
        {
            line.push_str(&format!(" weight:{weight}kg"));
        }
        if let Some(weight) = values
            .get(ids.batch_calculated_weight)
            .or_else(|| values.get(ids.batch_calculated_weight_length))
            .or_else(|| values.get(ids.batch_calculated_weight_length_sum))
        {
            line.push_str(&format!(" weight:~{weight}kg"));
        }
        if batch.is_sampling_batch() {
            if let Some(ratio) = batch.sampling_ratio {
                let text = batch.sampling_ratio_text.as_deref().unwrap_or_default();
                line.push_str(&format!(" samplingRatio:{ratio} ({text})"));
            }
        }
    }
    line
}

/// Indented dump of the subtree at `node`, one line per batch
///
/// Lines go to `sink` when given, otherwise to `debug!`.
pub fn log_tree(
    tree: &BatchTree,
    node: NodeId,
    opts: &LogTreeOptions,
    mut sink: Option<&mut dyn FnMut(&str)>,
) {
    let mut emit = |line: &str| match sink.as_deref_mut() {
        Some(sink) => sink(line),
        None => debug!("{line}"),
    };
    let Some(view) = tree.view(node) else { return };

    // (node, indent of its own line, indent prefix for its children)
    let mut stack = vec![(view, String::new(), String::new())];
    while let Some((current, indent, next_indent)) = stack.pop() {
        emit(&format!("{indent}{}", describe(current, opts)));

        let children: Vec<_> = current.children().collect();
        let last = children.len().saturating_sub(1);
        for (i, child) in children.into_iter().enumerate().rev() {
            let (child_indent, child_next) = if i == last {
                (format!("{next_indent} \\- "), format!("{next_indent}    "))
            } else {
                (format!("{next_indent} |- "), format!("{next_indent} |  "))
            };
            stack.push((child, child_indent, child_next));
        }
    }
}

/// Collect [`log_tree`] output into lines
pub fn tree_lines(tree: &BatchTree, node: NodeId, opts: &LogTreeOptions) -> Vec<String> {
    let mut lines = Vec::new();
    let mut push = |line: &str| lines.push(line.to_string());
    log_tree(tree, node, opts, Some(&mut push));
    lines
}
