use std::collections::HashMap;
use std::mem;

use crate::common::{NodeId, Result, RowId, TreeConfig, TreeError};

use super::comparator::Comparator;
use super::key::Key;

/// Per-variant contents of a tree node.
///
/// A leaf keeps one non-empty value list per key slot (duplicates share a
/// slot, insertion order preserved). An internal node keeps `keys.len() + 1`
/// child references; a key equal to a separator lives in the child on the
/// separator's right.
#[derive(Debug, Clone)]
pub(crate) enum NodeContents {
    Leaf { values: Vec<Vec<RowId>> },
    Internal { children: Vec<NodeId> },
}

/// One tree node. Sibling (`prev`/`next`) and `parent` links are plain ids
/// into the arena, used for traversal and the structural dump only; the
/// arena is the sole owner of every node.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
    pub keys: Vec<Key>,
    pub contents: NodeContents,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self.contents, NodeContents::Leaf { .. })
    }

    pub fn values(&self) -> &Vec<Vec<RowId>> {
        match &self.contents {
            NodeContents::Leaf { values } => values,
            NodeContents::Internal { .. } => panic!("values() called on internal node"),
        }
    }

    pub fn values_mut(&mut self) -> &mut Vec<Vec<RowId>> {
        match &mut self.contents {
            NodeContents::Leaf { values } => values,
            NodeContents::Internal { .. } => panic!("values_mut() called on internal node"),
        }
    }

    pub fn children(&self) -> &Vec<NodeId> {
        match &self.contents {
            NodeContents::Internal { children } => children,
            NodeContents::Leaf { .. } => panic!("children() called on leaf node"),
        }
    }

    pub fn children_mut(&mut self) -> &mut Vec<NodeId> {
        match &mut self.contents {
            NodeContents::Internal { children } => children,
            NodeContents::Leaf { .. } => panic!("children_mut() called on leaf node"),
        }
    }
}

/// Outcome of a recursive insertion, reported to the parent frame.
pub(crate) enum InsertEffect {
    Done,
    Split { separator: Key, right: NodeId },
}

/// First index with `keys[i] >= key` under the comparator.
pub(crate) fn lower_bound(keys: &[Key], cmp: &dyn Comparator, key: &Key) -> usize {
    let mut left = 0;
    let mut right = keys.len();
    while left < right {
        let mid = left + (right - left) / 2;
        if cmp.compare(&keys[mid], key) == std::cmp::Ordering::Less {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}

/// First index with `keys[i] > key` under the comparator. This is the child
/// index for descent: keys equal to a separator belong to its right child.
pub(crate) fn upper_bound(keys: &[Key], cmp: &dyn Comparator, key: &Key) -> usize {
    let mut left = 0;
    let mut right = keys.len();
    while left < right {
        let mid = left + (right - left) / 2;
        if cmp.compare(&keys[mid], key) == std::cmp::Ordering::Greater {
            right = mid;
        } else {
            left = mid + 1;
        }
    }
    left
}

/// Node storage for one tree: owned nodes plus the id counter. Ids grow
/// monotonically and are never reused within a tree's lifetime.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: HashMap<NodeId, Node>,
    next_id: u32,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, contents: NodeContents) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                parent: None,
                prev: None,
                next: None,
                keys: Vec::new(),
                contents,
            },
        );
        id
    }

    pub fn alloc_leaf(&mut self) -> NodeId {
        self.alloc(NodeContents::Leaf { values: Vec::new() })
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(&id).expect("dangling node id")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes.get_mut(&id).expect("dangling node id")
    }

    pub fn free(&mut self, id: NodeId) {
        self.nodes.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Smallest key of the subtree rooted at `id`.
    pub fn smallest_key(&self, id: NodeId) -> Key {
        let mut current = id;
        loop {
            let node = self.node(current);
            if node.is_leaf() {
                return node.keys[0].clone();
            }
            current = node.children()[0];
        }
    }

    /// Recursive insertion. On overflow the node splits and the separator
    /// plus new right sibling are reported upward; the facade handles a root
    /// split. Fails before any mutation when a duplicate key hits a unique
    /// tree.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        cmp: &dyn Comparator,
        cfg: &TreeConfig,
        unique: bool,
        index_name: &str,
        node_id: NodeId,
        key: &Key,
        value: RowId,
    ) -> Result<InsertEffect> {
        if self.node(node_id).is_leaf() {
            let node = self.node(node_id);
            let pos = lower_bound(&node.keys, cmp, key);
            if pos < node.keys.len() && cmp.equal(&node.keys[pos], key) {
                if unique {
                    return Err(TreeError::UniquenessViolation {
                        index: index_name.to_owned(),
                        key: key.to_string(),
                    });
                }
                self.node_mut(node_id).values_mut()[pos].push(value);
                return Ok(InsertEffect::Done);
            }
            let node = self.node_mut(node_id);
            node.keys.insert(pos, key.clone());
            node.values_mut().insert(pos, vec![value]);
            if self.node(node_id).keys.len() >= cfg.max_count() {
                let (separator, right) = self.split_leaf(cfg, node_id);
                return Ok(InsertEffect::Split { separator, right });
            }
            return Ok(InsertEffect::Done);
        }

        let child_idx = upper_bound(&self.node(node_id).keys, cmp, key);
        let child_id = self.node(node_id).children()[child_idx];
        match self.insert(cmp, cfg, unique, index_name, child_id, key, value)? {
            InsertEffect::Done => Ok(InsertEffect::Done),
            InsertEffect::Split { separator, right } => {
                let node = self.node_mut(node_id);
                node.keys.insert(child_idx, separator);
                node.children_mut().insert(child_idx + 1, right);
                self.node_mut(right).parent = Some(node_id);
                if self.node(node_id).keys.len() >= cfg.max_count() {
                    let (separator, right) = self.split_internal(cfg, node_id);
                    return Ok(InsertEffect::Split { separator, right });
                }
                Ok(InsertEffect::Done)
            }
        }
    }

    /// Splits an overflowing leaf: the left node keeps `min_key_len` slots,
    /// the new right sibling takes the rest and is spliced into the chain.
    /// Returns the promoted separator (the right node's first key).
    fn split_leaf(&mut self, cfg: &TreeConfig, left_id: NodeId) -> (Key, NodeId) {
        let right_id = self.alloc_leaf();
        let keep = cfg.min_key_len();

        let (separator, hi_keys, hi_values, old_next, parent) = {
            let left = self.node_mut(left_id);
            let hi_keys = left.keys.split_off(keep);
            let hi_values = left.values_mut().split_off(keep);
            let old_next = left.next;
            left.next = Some(right_id);
            (hi_keys[0].clone(), hi_keys, hi_values, old_next, left.parent)
        };

        let right = self.node_mut(right_id);
        right.keys = hi_keys;
        right.contents = NodeContents::Leaf { values: hi_values };
        right.prev = Some(left_id);
        right.next = old_next;
        right.parent = parent;

        if let Some(next_id) = old_next {
            self.node_mut(next_id).prev = Some(right_id);
        }
        (separator, right_id)
    }

    /// Splits an overflowing internal node: the key at `min_key_len` moves up
    /// as the separator, everything above it goes to the new right sibling.
    fn split_internal(&mut self, cfg: &TreeConfig, left_id: NodeId) -> (Key, NodeId) {
        let right_id = self.alloc(NodeContents::Internal {
            children: Vec::new(),
        });
        let mid = cfg.min_key_len();

        let (separator, hi_keys, hi_children, old_next, parent) = {
            let left = self.node_mut(left_id);
            let hi_keys = left.keys.split_off(mid + 1);
            let separator = left.keys.pop().expect("split of empty internal node");
            let hi_children = left.children_mut().split_off(mid + 1);
            let old_next = left.next;
            left.next = Some(right_id);
            (separator, hi_keys, hi_children, old_next, left.parent)
        };

        for &child_id in &hi_children {
            self.node_mut(child_id).parent = Some(right_id);
        }

        let right = self.node_mut(right_id);
        right.keys = hi_keys;
        right.contents = NodeContents::Internal {
            children: hi_children,
        };
        right.prev = Some(left_id);
        right.next = old_next;
        right.parent = parent;

        if let Some(next_id) = old_next {
            self.node_mut(next_id).prev = Some(right_id);
        }
        (separator, right_id)
    }

    /// Recursive removal. Returns the number of values removed (0 when the
    /// key or value was absent). Underflowing children are rebalanced by the
    /// parent frame; separators equal to the removed key are refreshed from
    /// the subtree on their right so descent keeps finding live keys.
    pub fn remove(
        &mut self,
        cmp: &dyn Comparator,
        cfg: &TreeConfig,
        node_id: NodeId,
        key: &Key,
        value: Option<RowId>,
    ) -> usize {
        if self.node(node_id).is_leaf() {
            return self.remove_from_leaf(cmp, node_id, key, value);
        }

        let child_idx = upper_bound(&self.node(node_id).keys, cmp, key);
        let child_id = self.node(node_id).children()[child_idx];
        let removed = self.remove(cmp, cfg, child_id, key, value);
        if removed == 0 {
            return 0;
        }

        let idx = if self.node(child_id).keys.len() < cfg.min_key_len() {
            self.rebalance_child(cfg, node_id, child_idx)
        } else {
            child_idx
        };

        if idx > 0 {
            let node = self.node(node_id);
            if idx - 1 < node.keys.len() && cmp.equal(&node.keys[idx - 1], key) {
                let subtree = node.children()[idx];
                let smallest = self.smallest_key(subtree);
                self.node_mut(node_id).keys[idx - 1] = smallest;
            }
        }
        removed
    }

    fn remove_from_leaf(
        &mut self,
        cmp: &dyn Comparator,
        node_id: NodeId,
        key: &Key,
        value: Option<RowId>,
    ) -> usize {
        let node = self.node(node_id);
        let pos = lower_bound(&node.keys, cmp, key);
        if pos >= node.keys.len() || !cmp.equal(&node.keys[pos], key) {
            return 0;
        }

        let node = self.node_mut(node_id);
        match value {
            Some(v) => {
                let list = &mut node.values_mut()[pos];
                match list.iter().position(|entry| *entry == v) {
                    None => 0,
                    Some(i) => {
                        list.remove(i);
                        if list.is_empty() {
                            node.keys.remove(pos);
                            node.values_mut().remove(pos);
                        }
                        1
                    }
                }
            }
            None => {
                node.keys.remove(pos);
                node.values_mut().remove(pos).len()
            }
        }
    }

    /// Repairs an underflowing child of `parent_id`: steal from the left
    /// sibling if it has a surplus, else from the right; otherwise merge into
    /// the left sibling when one exists, else into the right. Returns the
    /// child slot now holding the affected subtree.
    fn rebalance_child(&mut self, cfg: &TreeConfig, parent_id: NodeId, idx: usize) -> usize {
        let (left, right) = {
            let children = self.node(parent_id).children();
            let left = if idx > 0 { Some(children[idx - 1]) } else { None };
            let right = children.get(idx + 1).copied();
            (left, right)
        };

        if let Some(left_id) = left {
            if self.node(left_id).keys.len() > cfg.min_key_len() {
                self.steal_from_left(parent_id, idx);
                return idx;
            }
        }
        if let Some(right_id) = right {
            if self.node(right_id).keys.len() > cfg.min_key_len() {
                self.steal_from_right(parent_id, idx);
                return idx;
            }
        }
        if left.is_some() {
            self.merge_into_left(parent_id, idx);
            idx - 1
        } else {
            self.merge_into_right(parent_id, idx);
            idx
        }
    }

    fn steal_from_left(&mut self, parent_id: NodeId, idx: usize) {
        let child_id = self.node(parent_id).children()[idx];
        let left_id = self.node(parent_id).children()[idx - 1];

        if self.node(child_id).is_leaf() {
            let (stolen_key, stolen_values) = {
                let left = self.node_mut(left_id);
                let key = left.keys.pop().expect("steal from empty leaf");
                let values = left.values_mut().pop().expect("steal from empty leaf");
                (key, values)
            };
            let child = self.node_mut(child_id);
            child.keys.insert(0, stolen_key.clone());
            child.values_mut().insert(0, stolen_values);
            self.node_mut(parent_id).keys[idx - 1] = stolen_key;
        } else {
            // Rotation: the parent separator comes down, the left sibling's
            // last key goes up, its last child moves over.
            let separator = self.node(parent_id).keys[idx - 1].clone();
            let (new_separator, moved_child) = {
                let left = self.node_mut(left_id);
                let key = left.keys.pop().expect("steal from empty internal node");
                let child = left
                    .children_mut()
                    .pop()
                    .expect("steal from empty internal node");
                (key, child)
            };
            let child = self.node_mut(child_id);
            child.keys.insert(0, separator);
            child.children_mut().insert(0, moved_child);
            self.node_mut(moved_child).parent = Some(child_id);
            self.node_mut(parent_id).keys[idx - 1] = new_separator;
        }
    }

    fn steal_from_right(&mut self, parent_id: NodeId, idx: usize) {
        let child_id = self.node(parent_id).children()[idx];
        let right_id = self.node(parent_id).children()[idx + 1];

        if self.node(child_id).is_leaf() {
            let (stolen_key, stolen_values, new_first) = {
                let right = self.node_mut(right_id);
                let key = right.keys.remove(0);
                let values = right.values_mut().remove(0);
                let new_first = right.keys[0].clone();
                (key, values, new_first)
            };
            let child = self.node_mut(child_id);
            child.keys.push(stolen_key);
            child.values_mut().push(stolen_values);
            self.node_mut(parent_id).keys[idx] = new_first;
        } else {
            let separator = self.node(parent_id).keys[idx].clone();
            let (new_separator, moved_child) = {
                let right = self.node_mut(right_id);
                (right.keys.remove(0), right.children_mut().remove(0))
            };
            let child = self.node_mut(child_id);
            child.keys.push(separator);
            child.children_mut().push(moved_child);
            self.node_mut(moved_child).parent = Some(child_id);
            self.node_mut(parent_id).keys[idx] = new_separator;
        }
    }

    /// Merges the child at `idx` into its left sibling and drops it. For
    /// internal nodes the parent separator between the two is pulled down.
    fn merge_into_left(&mut self, parent_id: NodeId, idx: usize) {
        let child_id = self.node(parent_id).children()[idx];
        let left_id = self.node(parent_id).children()[idx - 1];

        if self.node(child_id).is_leaf() {
            let (mut keys, mut values, next) = {
                let child = self.node_mut(child_id);
                (
                    mem::take(&mut child.keys),
                    mem::take(child.values_mut()),
                    child.next,
                )
            };
            let left = self.node_mut(left_id);
            left.keys.append(&mut keys);
            left.values_mut().append(&mut values);
            left.next = next;
            if let Some(next_id) = next {
                self.node_mut(next_id).prev = Some(left_id);
            }
        } else {
            let separator = self.node(parent_id).keys[idx - 1].clone();
            let (mut keys, children, next) = {
                let child = self.node_mut(child_id);
                (
                    mem::take(&mut child.keys),
                    mem::take(child.children_mut()),
                    child.next,
                )
            };
            for &moved in &children {
                self.node_mut(moved).parent = Some(left_id);
            }
            let left = self.node_mut(left_id);
            left.keys.push(separator);
            left.keys.append(&mut keys);
            left.children_mut().extend(children);
            left.next = next;
            if let Some(next_id) = next {
                self.node_mut(next_id).prev = Some(left_id);
            }
        }

        let parent = self.node_mut(parent_id);
        parent.keys.remove(idx - 1);
        parent.children_mut().remove(idx);
        self.free(child_id);
    }

    /// Merges the child at `idx` into its right sibling and drops it.
    fn merge_into_right(&mut self, parent_id: NodeId, idx: usize) {
        let child_id = self.node(parent_id).children()[idx];
        let right_id = self.node(parent_id).children()[idx + 1];

        if self.node(child_id).is_leaf() {
            let (mut keys, mut values, prev) = {
                let child = self.node_mut(child_id);
                (
                    mem::take(&mut child.keys),
                    mem::take(child.values_mut()),
                    child.prev,
                )
            };
            let right = self.node_mut(right_id);
            keys.append(&mut right.keys);
            values.append(right.values_mut());
            right.keys = keys;
            *right.values_mut() = values;
            right.prev = prev;
            if let Some(prev_id) = prev {
                self.node_mut(prev_id).next = Some(right_id);
            }
        } else {
            let separator = self.node(parent_id).keys[idx].clone();
            let (mut keys, children, prev) = {
                let child = self.node_mut(child_id);
                (
                    mem::take(&mut child.keys),
                    mem::take(child.children_mut()),
                    child.prev,
                )
            };
            for &moved in &children {
                self.node_mut(moved).parent = Some(right_id);
            }
            keys.push(separator);
            let right = self.node_mut(right_id);
            keys.append(&mut right.keys);
            right.keys = keys;
            let mut merged_children = children;
            merged_children.append(right.children_mut());
            *right.children_mut() = merged_children;
            right.prev = prev;
            if let Some(prev_id) = prev {
                self.node_mut(prev_id).next = Some(right_id);
            }
        }

        let parent = self.node_mut(parent_id);
        parent.keys.remove(idx);
        parent.children_mut().remove(idx);
        self.free(child_id);
    }

    /// Bottom-up O(n) construction from presorted key slots. Entries are
    /// distributed evenly across `ceil(n / capacity)` nodes per level so no
    /// node lands below the minimum occupancy.
    pub fn build_from_slots(
        &mut self,
        cfg: &TreeConfig,
        slots: Vec<(Key, Vec<RowId>)>,
    ) -> NodeId {
        if slots.is_empty() {
            return self.alloc_leaf();
        }

        let mut level: Vec<(NodeId, Key)> = Vec::new();
        for group in distribute(slots, cfg.max_key_len()) {
            let id = self.alloc_leaf();
            let node = self.node_mut(id);
            for (key, values) in group {
                node.keys.push(key);
                node.values_mut().push(values);
            }
            let first = self.node(id).keys[0].clone();
            if let Some(&(prev_id, _)) = level.last() {
                self.node_mut(prev_id).next = Some(id);
                self.node_mut(id).prev = Some(prev_id);
            }
            level.push((id, first));
        }

        while level.len() > 1 {
            let mut upper: Vec<(NodeId, Key)> = Vec::new();
            for group in distribute(level, cfg.max_count()) {
                let id = self.alloc(NodeContents::Internal {
                    children: Vec::new(),
                });
                let first = group[0].1.clone();
                for (i, (child_id, child_first)) in group.into_iter().enumerate() {
                    if i > 0 {
                        self.node_mut(id).keys.push(child_first);
                    }
                    self.node_mut(id).children_mut().push(child_id);
                    self.node_mut(child_id).parent = Some(id);
                }
                if let Some(&(prev_id, _)) = upper.last() {
                    self.node_mut(prev_id).next = Some(id);
                    self.node_mut(id).prev = Some(prev_id);
                }
                upper.push((id, first));
            }
            level = upper;
        }

        level[0].0
    }
}

/// Splits `items` into `ceil(len / capacity)` consecutive groups whose sizes
/// differ by at most one.
fn distribute<T>(items: Vec<T>, capacity: usize) -> Vec<Vec<T>> {
    let len = items.len();
    let count = (len + capacity - 1) / capacity;
    let base = len / count;
    let extra = len % count;

    let mut groups = Vec::with_capacity(count);
    let mut iter = items.into_iter();
    for i in 0..count {
        let size = if i < extra { base + 1 } else { base };
        groups.push(iter.by_ref().take(size).collect());
    }
    groups
}
