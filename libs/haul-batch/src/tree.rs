//! Arena-backed batch tree
//!
//! Nodes live in a slot vector and refer to each other by [`NodeId`]. A parent owns its
//! ordered child list; the parent link is a plain index used for upward lookups, so the
//! structure stays acyclic and can be cloned or serialized without reference cycles.
//! Removing a node frees its whole subtree.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::error::{BatchError, Result};
use crate::label::{acquisition_level, BatchLabel};

/// Index of a node in its [`BatchTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Node {
    batch: Batch,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Nested plain-object shape: a batch with its children inline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchObject {
    #[serde(flatten)]
    pub batch: Batch,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BatchObject>,
}

impl BatchObject {
    pub fn leaf(batch: Batch) -> Self {
        Self {
            batch,
            children: Vec::new(),
        }
    }

    pub fn with_children(batch: Batch, children: Vec<BatchObject>) -> Self {
        Self { batch, children }
    }
}

/// Arena of batch nodes
///
/// Slots freed by [`BatchTree::remove`] are reused by later insertions, so a removed
/// [`NodeId`] must not be kept around.
#[derive(Debug, Clone)]
pub struct BatchTree {
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    live: usize,
    root: NodeId,
}

impl BatchTree {
    pub fn new(root: Batch) -> Self {
        Self {
            nodes: vec![Some(Node {
                batch: root,
                parent: None,
                children: Vec::new(),
            })],
            free: Vec::new(),
            live: 1,
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    /// Allocated slots, live or free
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = Some(node);
                id
            },
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn get(&self, id: NodeId) -> Option<&Batch> {
        self.node(id).map(|n| &n.batch)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Batch> {
        self.node_mut(id).map(|n| &mut n.batch)
    }

    pub fn batch(&self, id: NodeId) -> Result<&Batch> {
        self.get(id).ok_or(BatchError::NodeNotFound(id))
    }

    pub fn batch_mut(&mut self, id: NodeId) -> Result<&mut Batch> {
        self.get_mut(id).ok_or(BatchError::NodeNotFound(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Ordered children; empty for an unknown node
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Read-only view with upward and downward navigation
    pub fn view(&self, id: NodeId) -> Option<BatchRef<'_>> {
        self.get(id).map(|batch| BatchRef {
            tree: self,
            id,
            batch,
        })
    }

    pub fn root_ref(&self) -> Option<BatchRef<'_>> {
        self.view(self.root)
    }

    pub fn add_child(&mut self, parent: NodeId, batch: Batch) -> Result<NodeId> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, batch)
    }

    /// Insert at `index` among the children of `parent` (clamped to the child count)
    pub fn insert_child(&mut self, parent: NodeId, index: usize, batch: Batch) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(BatchError::NodeNotFound(parent));
        }
        let id = self.alloc(Node {
            batch,
            parent: Some(parent),
            children: Vec::new(),
        });
        let siblings = &mut self.node_mut(parent).ok_or(BatchError::NodeNotFound(parent))?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        Ok(id)
    }

    /// Graft a nested object below `parent`
    pub fn add_object(&mut self, parent: NodeId, object: BatchObject) -> Result<NodeId> {
        let BatchObject { batch, children } = object;
        let id = self.add_child(parent, batch)?;
        for child in children {
            self.add_object(id, child)?;
        }
        Ok(id)
    }

    /// Remove a node and its whole subtree, returning the removed batch
    pub fn remove(&mut self, id: NodeId) -> Result<Batch> {
        if id == self.root {
            return Err(BatchError::RootRemoval);
        }
        if !self.contains(id) {
            return Err(BatchError::NodeNotFound(id));
        }

        if let Some(parent) = self.parent(id) {
            if let Some(node) = self.node_mut(parent) {
                node.children.retain(|c| *c != id);
            }
        }

        let subtree = self.depth_first(id);
        let mut removed = None;
        for node_id in subtree {
            if let Some(node) = self.nodes.get_mut(node_id.0).and_then(Option::take) {
                self.live -= 1;
                self.free.push(node_id);
                if node_id == id {
                    removed = Some(node.batch);
                }
            }
        }
        removed.ok_or(BatchError::NodeNotFound(id))
    }

    /// Detach `id` and reinsert it below `new_parent` at `index`
    ///
    /// Moving within the same parent reorders siblings.
    pub fn move_child(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<()> {
        if !self.contains(id) {
            return Err(BatchError::NodeNotFound(id));
        }
        if !self.contains(new_parent) {
            return Err(BatchError::NodeNotFound(new_parent));
        }
        if id == self.root || self.is_ancestor_or_self(id, new_parent) {
            return Err(BatchError::CyclicMove(id));
        }

        if let Some(old_parent) = self.parent(id) {
            if let Some(node) = self.node_mut(old_parent) {
                node.children.retain(|c| *c != id);
            }
        }
        let siblings = &mut self.node_mut(new_parent).ok_or(BatchError::NodeNotFound(new_parent))?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        if let Some(node) = self.node_mut(id) {
            node.parent = Some(new_parent);
        }
        Ok(())
    }

    /// Replace the children of `parent` with a single new node that adopts them
    ///
    /// Returns the id of the inserted node.
    pub fn wrap_children(&mut self, parent: NodeId, batch: Batch) -> Result<NodeId> {
        if !self.contains(parent) {
            return Err(BatchError::NodeNotFound(parent));
        }
        let adopted = self.children(parent).to_vec();
        let wrapper = self.alloc(Node {
            batch,
            parent: Some(parent),
            children: adopted.clone(),
        });
        for child in &adopted {
            if let Some(node) = self.node_mut(*child) {
                node.parent = Some(wrapper);
            }
        }
        let node = self.node_mut(parent).ok_or(BatchError::NodeNotFound(parent))?;
        node.children = vec![wrapper];
        Ok(wrapper)
    }

    /// True if `ancestor` is `node` or lies on the path from `node` to the root
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Number of edges between `id` and the root
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    /// Pre-order walk of the subtree rooted at `from`
    pub fn depth_first(&self, from: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    /// Pre-order walk of the whole tree
    pub fn iter(&self) -> impl Iterator<Item = BatchRef<'_>> {
        self.depth_first(self.root)
            .into_iter()
            .filter_map(move |id| self.view(id))
    }

    // ==================== Plain-object conversion ====================

    /// Build from the nested plain-object shape
    pub fn from_object(object: BatchObject) -> Result<Self> {
        let BatchObject { batch, children } = object;
        let mut tree = Self::new(batch);
        let root = tree.root;
        for child in children {
            tree.add_object(root, child)?;
        }
        Ok(tree)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Self::from_object(serde_json::from_value(value)?)
    }

    /// Nested plain-object shape of the subtree at `id`
    ///
    /// Each node's `parent_id` is the in-memory parent's id when it has one, otherwise the
    /// stored foreign key.
    pub fn as_object(&self, id: NodeId) -> Result<BatchObject> {
        let node = self.node(id).ok_or(BatchError::NodeNotFound(id))?;
        let mut batch = node.batch.clone();
        if let Some(parent_id) = node.parent.and_then(|p| self.get(p)).and_then(|p| p.id) {
            batch.parent_id = Some(parent_id);
        }
        let children = node
            .children
            .iter()
            .map(|c| self.as_object(*c))
            .collect::<Result<Vec<_>>>()?;
        Ok(BatchObject { batch, children })
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.as_object(self.root)?)?)
    }

    /// Rebuild a tree from a flat list linked by `parent_id`
    ///
    /// The catch batch is the first batch without parent whose label is blank or
    /// `CATCH_BATCH`. Returns `None` when there is none. Batches whose parent cannot be
    /// reached from the catch batch are dropped. Linked batches lose their `parent_id`,
    /// the tree structure carries it.
    pub fn from_object_array_as_tree(batches: Vec<Batch>) -> Option<Self> {
        let catch_index = batches
            .iter()
            .position(|b| b.parent_id.is_none() && is_catch_label(b.label.as_ref()))?;

        let index_by_id: FxHashMap<i64, usize> = batches
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.id.map(|id| (id, i)))
            .collect();

        let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); batches.len()];
        for (i, batch) in batches.iter().enumerate() {
            if i == catch_index {
                continue;
            }
            if let Some(parent) = batch.parent_id.and_then(|pid| index_by_id.get(&pid)) {
                if *parent != i {
                    children_of[*parent].push(i);
                }
            }
        }

        let total = batches.len();
        let mut slots: Vec<Option<Batch>> = batches.into_iter().map(Some).collect();
        let mut root_batch = slots[catch_index].take()?;
        root_batch.parent_id = None;
        let mut tree = Self::new(root_batch);

        let mut stack = vec![(catch_index, tree.root)];
        let mut linked = 1;
        while let Some((index, node_id)) = stack.pop() {
            for child_index in children_of[index].iter().copied() {
                let Some(mut child) = slots[child_index].take() else { continue };
                child.parent_id = None;
                let Ok(child_id) = tree.add_child(node_id, child) else { continue };
                linked += 1;
                stack.push((child_index, child_id));
            }
        }

        if linked < total {
            warn!(linked, total, "Batches unreachable from the catch batch were dropped");
        }
        debug!(nodes = tree.len(), "Catch batch rebuilt as tree");
        Some(tree)
    }

    /// Flatten to a pre-order list where every child carries its parent's id
    ///
    /// Fails when a parent has no id, since the link could not be expressed.
    pub fn tree_as_object_array(&self) -> Result<Vec<Batch>> {
        let mut out = Vec::with_capacity(self.len());
        for id in self.depth_first(self.root) {
            let node = self.node(id).ok_or(BatchError::NodeNotFound(id))?;
            let mut batch = node.batch.clone();
            if let Some(parent) = node.parent.and_then(|p| self.get(p)) {
                let parent_id = parent
                    .id
                    .ok_or_else(|| BatchError::missing_parent_id(parent.label_text()))?;
                batch.parent_id = Some(parent_id);
            }
            out.push(batch);
        }
        Ok(out)
    }
}

fn is_catch_label(label: Option<&BatchLabel>) -> bool {
    match label {
        None => true,
        Some(label) => label.is_empty() || label.to_string() == acquisition_level::CATCH_BATCH,
    }
}

/// Borrowed view of one node
#[derive(Debug, Clone, Copy)]
pub struct BatchRef<'a> {
    tree: &'a BatchTree,
    id: NodeId,
    batch: &'a Batch,
}

impl<'a> BatchRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a BatchTree {
        self.tree
    }

    pub fn batch(&self) -> &'a Batch {
        self.batch
    }

    pub fn parent(&self) -> Option<BatchRef<'a>> {
        self.tree.parent(self.id).and_then(|p| self.tree.view(p))
    }

    pub fn children(&self) -> impl Iterator<Item = BatchRef<'a>> + 'a {
        let tree = self.tree;
        tree.children(self.id)
            .iter()
            .filter_map(move |c| tree.view(*c))
    }

    pub fn has_children(&self) -> bool {
        !self.tree.children(self.id).is_empty()
    }

    /// In-memory parent id, falling back to the stored foreign key
    pub fn parent_id(&self) -> Option<i64> {
        self.parent()
            .and_then(|p| p.batch().id)
            .or(self.batch().parent_id)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(tree: &BatchTree) -> Vec<String> {
        tree.iter().map(|b| b.batch().label_text()).collect()
    }

    #[test]
    fn test_add_insert_and_iterate() {
        let mut tree = BatchTree::new(Batch::with_label("CATCH_BATCH"));
        let root = tree.root();
        let a = tree.add_child(root, Batch::with_label("SORTING_BATCH#1")).unwrap();
        tree.add_child(a, Batch::with_label("SORTING_BATCH#1.LAN")).unwrap();
        tree.insert_child(root, 0, Batch::with_label("SORTING_BATCH#0")).unwrap();

        assert_eq!(
            labels(&tree),
            vec!["CATCH_BATCH", "SORTING_BATCH#0", "SORTING_BATCH#1", "SORTING_BATCH#1.LAN"]
        );
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_remove_cascades() {
        let mut tree = BatchTree::new(Batch::with_label("CATCH_BATCH"));
        let root = tree.root();
        let a = tree.add_child(root, Batch::with_label("SORTING_BATCH#1")).unwrap();
        let lan = tree.add_child(a, Batch::with_label("SORTING_BATCH#1.LAN")).unwrap();
        tree.add_child(lan, Batch::with_label("SORTING_BATCH#1.LAN.%")).unwrap();
        let b = tree.add_child(root, Batch::with_label("SORTING_BATCH#2")).unwrap();

        let removed = tree.remove(a).unwrap();
        assert_eq!(removed.label_text(), "SORTING_BATCH#1");
        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(lan));
        assert_eq!(tree.children(root), &[b]);
        assert!(matches!(tree.remove(root), Err(BatchError::RootRemoval)));
        assert!(matches!(tree.remove(a), Err(BatchError::NodeNotFound(_))));
    }

    #[test]
    fn test_removed_slots_are_reused() {
        let mut tree = BatchTree::new(Batch::with_label("CATCH_BATCH"));
        let root = tree.root();
        for _ in 0..1000 {
            let id = tree.add_child(root, Batch::with_label("SORTING_BATCH#1")).unwrap();
            tree.add_child(id, Batch::with_label("SORTING_BATCH#1.LAN")).unwrap();
            tree.remove(id).unwrap();
        }
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.capacity(), 3);

        let kept = tree.add_child(root, Batch::with_label("SORTING_BATCH#2")).unwrap();
        assert!(kept.index() < 3);
        assert_eq!(tree.len(), 2);
        assert_eq!(labels(&tree), vec!["CATCH_BATCH", "SORTING_BATCH#2"]);
    }

    #[test]
    fn test_move_child() {
        let mut tree = BatchTree::new(Batch::with_label("CATCH_BATCH"));
        let root = tree.root();
        let a = tree.add_child(root, Batch::with_label("SORTING_BATCH#1")).unwrap();
        let b = tree.add_child(root, Batch::with_label("SORTING_BATCH#2")).unwrap();

        tree.move_child(b, root, 0).unwrap();
        assert_eq!(tree.children(root), &[b, a]);

        tree.move_child(a, b, 0).unwrap();
        assert_eq!(tree.parent(a), Some(b));
        assert!(matches!(tree.move_child(b, a, 0), Err(BatchError::CyclicMove(_))));
    }

    #[test]
    fn test_nested_object_round_trip() {
        let value = json!({
            "label": "CATCH_BATCH",
            "id": 1,
            "children": [
                {"label": "SORTING_BATCH#1", "id": 2, "rankOrder": 1, "children": [
                    {"label": "SORTING_BATCH#1.LAN", "id": 3, "rankOrder": 1}
                ]}
            ]
        });
        let tree = BatchTree::from_json(value).unwrap();
        assert_eq!(tree.len(), 3);

        let object = tree.as_object(tree.root()).unwrap();
        assert_eq!(object.children[0].batch.parent_id, Some(1));
        assert_eq!(object.children[0].children[0].batch.parent_id, Some(2));

        let json = tree.to_json().unwrap();
        assert_eq!(json["children"][0]["children"][0]["label"], "SORTING_BATCH#1.LAN");
    }

    #[test]
    fn test_flat_array_round_trip() {
        let flat = vec![
            Batch::with_label("SORTING_BATCH#1").with_id(2).with_parent(1),
            Batch::with_label("CATCH_BATCH").with_id(1),
            Batch::with_label("SORTING_BATCH#1.LAN").with_id(3).with_parent(2),
            Batch::with_label("SORTING_BATCH#9").with_id(9).with_parent(42),
        ];
        let tree = BatchTree::from_object_array_as_tree(flat).unwrap();
        assert_eq!(labels(&tree), vec!["CATCH_BATCH", "SORTING_BATCH#1", "SORTING_BATCH#1.LAN"]);
        assert!(tree.iter().all(|b| b.batch().parent_id.is_none()));

        let array = tree.tree_as_object_array().unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array[2].parent_id, Some(2));
    }

    #[test]
    fn test_flat_array_without_catch_batch() {
        let flat = vec![Batch::with_label("SORTING_BATCH#1").with_id(2).with_parent(1)];
        assert!(BatchTree::from_object_array_as_tree(flat).is_none());
    }

    #[test]
    fn test_tree_as_array_requires_parent_ids() {
        let mut tree = BatchTree::new(Batch::with_label("CATCH_BATCH"));
        let root = tree.root();
        tree.add_child(root, Batch::with_label("SORTING_BATCH#1")).unwrap();
        let err = tree.tree_as_object_array().unwrap_err();
        assert!(matches!(err, BatchError::MissingParentId { ref label } if label == "CATCH_BATCH"));
    }

    #[test]
    fn test_parent_id_coalesce() {
        let mut tree = BatchTree::new(Batch::with_label("CATCH_BATCH").with_id(7));
        let root = tree.root();
        let mut child = Batch::with_label("SORTING_BATCH#1");
        child.parent_id = Some(99);
        let id = tree.add_child(root, child).unwrap();
        assert_eq!(tree.view(id).unwrap().parent_id(), Some(7));

        let mut orphan_tree = BatchTree::new(Batch::with_label("SORTING_BATCH#1"));
        orphan_tree.get_mut(orphan_tree.root()).unwrap().parent_id = Some(99);
        assert_eq!(orphan_tree.root_ref().unwrap().parent_id(), Some(99));
    }
}
