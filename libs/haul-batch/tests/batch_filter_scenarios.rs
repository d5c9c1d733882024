//! Batch filter scenarios on plain-object trees
//!
//! - Conjunction: each clause flips the result independently
//! - Sampling flag derived from the label suffix
//! - Parent filters and deletion by filter

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use haul_batch::utils::{get_or_create_sampling_child, sum_observed_individual_count};
use haul_batch::{delete_by_filter, find_by_filter, Batch, BatchFilter, BatchTree};
use proptest::prelude::*;
use serde_json::json;

fn catch_tree() -> BatchTree {
    BatchTree::from_json(json!({
        "__typename": "BatchVO",
        "id": 100,
        "label": "CATCH_BATCH",
        "rankOrder": 1,
        "operationId": 5,
        "children": [
            {
                "id": 101,
                "label": "SORTING_BATCH#1.LAN",
                "rankOrder": 1,
                "operationId": 5,
                "measurementValues": {"90": "190"},
                "children": [
                    {
                        "id": 102,
                        "label": "SORTING_BATCH#1.LAN.%",
                        "rankOrder": 1,
                        "operationId": 5,
                        "samplingRatio": 0.5,
                        "children": [
                            {"id": 103, "label": "SORTING_BATCH_INDIVIDUAL#1", "rankOrder": 1, "operationId": 5},
                            {"id": 104, "label": "SORTING_BATCH_INDIVIDUAL#2", "rankOrder": 2, "operationId": 5, "individualCount": 3}
                        ]
                    }
                ]
            },
            {
                "id": 105,
                "label": "SORTING_BATCH#1.DIS",
                "rankOrder": 2,
                "operationId": 6,
                "measurementValues": {"90": 191}
            }
        ]
    }))
    .unwrap()
}

fn ids(tree: &BatchTree, nodes: &[haul_batch::NodeId]) -> Vec<i64> {
    nodes.iter().filter_map(|n| tree.get(*n).and_then(|b| b.id)).collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn filter_clauses_are_independent(operation_id in 1i64..10, sampling in any::<bool>()) {
        let mut batch = Batch::with_label(if sampling { "SORTING_BATCH#1.%" } else { "SORTING_BATCH#1" });
        batch.operation_id = Some(operation_id);
        let tree = BatchTree::new(batch);
        let root = tree.root_ref().unwrap();

        let matching = BatchFilter {
            operation_id: Some(operation_id),
            is_sampling_batch: Some(sampling),
            ..Default::default()
        };
        prop_assert!(matching.as_filter_fn()(root));

        let wrong_operation = BatchFilter {
            operation_id: Some(operation_id + 1),
            ..matching.clone()
        };
        prop_assert!(!wrong_operation.as_filter_fn()(root));

        let wrong_flag = BatchFilter {
            is_sampling_batch: Some(!sampling),
            ..matching.clone()
        };
        prop_assert!(!wrong_flag.as_filter_fn()(root));
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_sampling_suffix_fails_non_sampling_filter() {
    let filter = BatchFilter::from_object(json!({"isSamplingBatch": false})).unwrap();
    let tree = BatchTree::new(Batch::with_label("SORTING_BATCH#1.LAN.%"));
    assert!(!filter.as_filter_fn()(tree.root_ref().unwrap()));
}

#[test]
fn test_operation_and_sampling_conjunction() {
    let tree = catch_tree();
    let filter = BatchFilter::from_object(json!({"operationId": 5, "isSamplingBatch": true})).unwrap();
    assert_eq!(ids(&tree, &find_by_filter(&tree, &filter)), vec![102]);
}

#[test]
fn test_parent_filter_on_landing_branch() {
    let tree = catch_tree();
    let filter = BatchFilter::from_object(json!({
        "parentFilter": {"measurementValues": {"90": 190}}
    }))
    .unwrap();
    assert_eq!(ids(&tree, &find_by_filter(&tree, &filter)), vec![102]);

    let nested = BatchFilter::from_object(json!({
        "parentFilter": {"parentFilter": {"measurementValues": {"90": 190}}}
    }))
    .unwrap();
    assert_eq!(ids(&tree, &find_by_filter(&tree, &nested)), vec![103, 104]);
}

#[test]
fn test_parent_id_uses_loaded_parent() {
    let tree = catch_tree();
    let filter = BatchFilter::from_object(json!({"parentId": 102})).unwrap();
    assert_eq!(ids(&tree, &find_by_filter(&tree, &filter)), vec![103, 104]);
}

#[test]
fn test_delete_discard_branch() {
    let mut tree = catch_tree();
    let filter = BatchFilter::from_object(json!({"measurementValues": {"90": 191}})).unwrap();
    let removed = delete_by_filter(&mut tree, &filter);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, Some(105));
    assert_eq!(tree.len(), 5);
}

#[test]
fn test_observed_individuals_and_sampling_child() {
    let mut tree = catch_tree();
    let root = tree.root();
    assert_eq!(sum_observed_individual_count(&tree, &[root]), 4);

    let lan = tree.children(root)[0];
    let sampling = get_or_create_sampling_child(&mut tree, lan).unwrap();
    assert_eq!(tree.get(sampling).unwrap().id, Some(102));
}

#[test]
fn test_json_round_trip_keeps_parent_links() {
    let tree = catch_tree();
    let json = tree.to_json().unwrap();
    assert_eq!(json["children"][0]["parentId"], 100);
    assert_eq!(json["children"][0]["children"][0]["children"][1]["individualCount"], 3);
}
