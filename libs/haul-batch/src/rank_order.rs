//! Rank order assignment
//!
//! Walks a batch tree depth-first and renumbers every node's children per kind group (the
//! acquisition level of the label). Within a group ranks are `1..=n` in the current child
//! order, so groups never influence each other. Individual batches get their count suffix
//! rewritten to the new rank; sampling batches that share their carrier's level get their
//! label resynced to `<carrier label>.%`. Branch tails such as `.LAN` or `.DIS` are kept.
//!
//! The assignment is total and idempotent: any tree shape is accepted, and running it twice
//! changes nothing the second time.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::label::BatchLabel;
use crate::tree::{BatchTree, NodeId};

/// Renumber the whole tree
pub fn compute_rank_order(tree: &mut BatchTree) {
    let root = tree.root();
    compute_rank_order_from(tree, root);
}

/// Renumber the subtree below `from`; `from` itself keeps its rank
pub fn compute_rank_order_from(tree: &mut BatchTree, from: NodeId) {
    let order = tree.depth_first(from);
    let mut relabelled = 0usize;

    for node in order {
        let children = tree.children(node).to_vec();
        if children.is_empty() {
            continue;
        }
        let carrier_label = tree.get(node).and_then(|b| b.label.clone());
        let mut counters: FxHashMap<String, u32> = FxHashMap::default();

        for child in children {
            let Some(batch) = tree.get_mut(child) else { continue };

            let counter = counters.entry(batch.kind_group().to_string()).or_insert(0);
            *counter += 1;
            let rank = *counter;
            batch.rank_order = Some(rank);

            let new_label = match (&batch.label, &carrier_label) {
                (Some(label), Some(carrier)) if label.sampling && label.level == carrier.level => {
                    Some(BatchLabel::sampling_of(carrier))
                },
                (Some(label), _) if !label.sampling && label.is_individual() => Some(BatchLabel {
                    number: Some(rank),
                    ..label.clone()
                }),
                _ => None,
            };
            if let Some(new_label) = new_label {
                if batch.label.as_ref() != Some(&new_label) {
                    trace!(from = %batch.label_text(), to = %new_label, rank, "Relabel batch");
                    batch.label = Some(new_label);
                    relabelled += 1;
                }
            }
        }
    }

    debug!(relabelled, "Rank order computed");
}
