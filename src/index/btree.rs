use std::cmp::Ordering;
use std::fmt;

use crate::common::{NodeId, Result, RowId, TreeConfig, TreeError};

use super::comparator::Comparator;
use super::iterator::SlotCursor;
use super::key::{Key, Scalar};
use super::key_range::KeyRange;
use super::node::{lower_bound, Arena, InsertEffect, NodeContents};
use super::rows::{self, IndexRow};

/// Aggregate counters kept by the tree, available without a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    /// Number of stored values across all key slots.
    pub total_rows: usize,
}

/// An in-memory B+Tree index.
///
/// Keys are kept in comparator order in the leaves, which form a doubly
/// linked chain for range scans. A unique tree holds one value per key; a
/// non-unique tree keeps all values of one key in a single slot, in insertion
/// order. An empty tree is a single empty leaf.
///
/// Fan-out is fixed per instance through [`TreeConfig`]; a serialized tree
/// must be deserialized with the same configuration.
pub struct BTree {
    name: String,
    comparator: Box<dyn Comparator>,
    unique: bool,
    config: TreeConfig,
    arena: Arena,
    root: NodeId,
    total_rows: usize,
}

impl BTree {
    /// An empty tree with the default fan-out.
    pub fn new(name: impl Into<String>, comparator: Box<dyn Comparator>, unique: bool) -> Self {
        Self::with_config(name, comparator, unique, TreeConfig::default())
    }

    /// An empty tree with an explicit fan-out configuration.
    pub fn with_config(
        name: impl Into<String>,
        comparator: Box<dyn Comparator>,
        unique: bool,
        config: TreeConfig,
    ) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc_leaf();
        Self {
            name: name.into(),
            comparator,
            unique,
            config,
            arena,
            root,
            total_rows: 0,
        }
    }

    /// Bulk-builds a tree from `(key, value)` pairs already sorted in
    /// comparator order, in O(n). Duplicate keys must be adjacent; out of
    /// order input fails with [`TreeError::UnsortedData`].
    pub fn from_sorted(
        name: impl Into<String>,
        comparator: Box<dyn Comparator>,
        unique: bool,
        config: TreeConfig,
        data: Vec<(Key, RowId)>,
    ) -> Result<Self> {
        let name = name.into();
        let mut slots: Vec<(Key, Vec<RowId>)> = Vec::new();
        for (key, value) in data {
            let ordering = slots.last().map(|(last, _)| comparator.compare(last, &key));
            match ordering {
                Some(Ordering::Greater) => {
                    return Err(TreeError::UnsortedData(format!(
                        "key {} sorts before its predecessor",
                        key
                    )))
                }
                Some(Ordering::Equal) => {
                    if unique {
                        return Err(TreeError::UniquenessViolation {
                            index: name,
                            key: key.to_string(),
                        });
                    }
                    if let Some((_, values)) = slots.last_mut() {
                        values.push(value);
                    }
                }
                _ => slots.push((key, vec![value])),
            }
        }

        let total_rows = slots.iter().map(|(_, values)| values.len()).sum();
        let mut arena = Arena::new();
        let root = arena.build_from_slots(&config, slots);
        Ok(Self {
            name,
            comparator,
            unique,
            config,
            arena,
            root,
            total_rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Adds one value under `key`. On a unique tree an existing key fails
    /// with [`TreeError::UniquenessViolation`] and leaves the tree untouched;
    /// on a non-unique tree the value is appended to the key's slot.
    pub fn add(&mut self, key: impl Into<Key>, value: RowId) -> Result<()> {
        let key = key.into();
        let comparator = &*self.comparator;
        let effect = self.arena.insert(
            comparator,
            &self.config,
            self.unique,
            &self.name,
            self.root,
            &key,
            value,
        )?;
        if let InsertEffect::Split { separator, right } = effect {
            let old_root = self.root;
            let new_root = self.arena.alloc(NodeContents::Internal {
                children: vec![old_root, right],
            });
            self.arena.node_mut(new_root).keys.push(separator);
            self.arena.node_mut(old_root).parent = Some(new_root);
            self.arena.node_mut(right).parent = Some(new_root);
            self.root = new_root;
        }
        self.total_rows += 1;
        Ok(())
    }

    /// Upserts `key` to hold exactly `[value]`. On a non-unique tree this
    /// drops every previously stored value of the key; never fails, even on
    /// a unique tree with the key present.
    pub fn set(&mut self, key: impl Into<Key>, value: RowId) -> Result<()> {
        let key = key.into();
        let leaf = self.find_leaf(&key);
        let comparator = &*self.comparator;
        let node = self.arena.node(leaf);
        let pos = lower_bound(&node.keys, comparator, &key);
        if pos < node.keys.len() && comparator.equal(&node.keys[pos], &key) {
            let list = &mut self.arena.node_mut(leaf).values_mut()[pos];
            self.total_rows -= list.len();
            list.clear();
            list.push(value);
            self.total_rows += 1;
            return Ok(());
        }
        self.add(key, value)
    }

    /// Removes values under `key`: the given value only, or the whole slot
    /// when `value` is `None`. Returns the number of values removed; 0 means
    /// nothing matched and the tree is unchanged.
    pub fn remove(&mut self, key: impl Into<Key>, value: Option<RowId>) -> usize {
        let key = key.into();
        let comparator = &*self.comparator;
        let removed = self
            .arena
            .remove(comparator, &self.config, self.root, &key, value);
        if removed == 0 {
            return 0;
        }
        self.total_rows -= removed;

        // A root with a single child carries no keys and gets demoted.
        while !self.arena.node(self.root).is_leaf()
            && self.arena.node(self.root).children().len() == 1
        {
            let old_root = self.root;
            let child = self.arena.node(old_root).children()[0];
            self.arena.free(old_root);
            self.arena.node_mut(child).parent = None;
            self.root = child;
        }
        removed
    }

    /// All values stored under `key`, in insertion order. Empty when the key
    /// is absent.
    pub fn get(&self, key: impl Into<Key>) -> Vec<RowId> {
        let key = key.into();
        let comparator = &*self.comparator;
        let node = self.arena.node(self.find_leaf(&key));
        let pos = lower_bound(&node.keys, comparator, &key);
        if pos < node.keys.len() && comparator.equal(&node.keys[pos], &key) {
            node.values()[pos].clone()
        } else {
            Vec::new()
        }
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let comparator = &*self.comparator;
        let node = self.arena.node(self.find_leaf(&key));
        let pos = lower_bound(&node.keys, comparator, &key);
        pos < node.keys.len() && comparator.equal(&node.keys[pos], &key)
    }

    /// Values of all keys matching `ranges`, in comparator order (reversed
    /// when `reverse`). `ranges` is one composite predicate, one [`KeyRange`]
    /// per key field; `None` or empty matches every key. `skip` drops matched
    /// values from the front of the traversal order before `limit` caps the
    /// result.
    pub fn get_range(
        &self,
        ranges: Option<&[KeyRange]>,
        reverse: bool,
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> Vec<RowId> {
        let mut results = Vec::new();
        if self.total_rows == 0 || limit == Some(0) {
            return results;
        }
        let unbounded = [KeyRange::all()];
        let ranges = match ranges {
            Some(r) if !r.is_empty() => r,
            _ => &unbounded[..],
        };
        let first = &ranges[0];
        let (start, end) = self.comparator.bound_points(first);

        let mut to_skip = skip.unwrap_or(0);
        let max = limit.unwrap_or(usize::MAX);
        let cursor = if reverse {
            self.seek_end(end.as_ref())
        } else {
            self.seek_start(start.as_ref())
        };
        for (key, values) in cursor {
            match self.comparator.compare_range(key, first) {
                Ordering::Greater if !reverse => break,
                Ordering::Less if reverse => break,
                Ordering::Equal => {}
                // Still on the entry side of the range, keep walking.
                _ => continue,
            }
            if !self.comparator.is_in_range(key, ranges) {
                continue;
            }
            for &row in values {
                if to_skip > 0 {
                    to_skip -= 1;
                    continue;
                }
                results.push(row);
                if results.len() == max {
                    return results;
                }
            }
        }
        results
    }

    /// Number of values a scan of `range` would visit; `None` counts the
    /// whole tree without a scan.
    pub fn cost(&self, range: Option<&KeyRange>) -> usize {
        let range = match range {
            None => return self.total_rows,
            Some(r) => r,
        };
        let (start, _) = self.comparator.bound_points(range);
        let mut count = 0;
        for (key, values) in self.seek_start(start.as_ref()) {
            match self.comparator.compare_range(key, range) {
                Ordering::Greater => break,
                Ordering::Equal => count += values.len(),
                Ordering::Less => {}
            }
        }
        count
    }

    /// Drops every entry; the tree reverts to a single empty leaf and node
    /// ids restart from 0.
    pub fn clear(&mut self) {
        self.arena = Arena::new();
        self.root = self.arena.alloc_leaf();
        self.total_rows = 0;
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_rows: self.total_rows,
        }
    }

    /// Flattens the tree into rows, one per node, ids assigned in preorder
    /// starting at 0. The output is canonical: equal trees serialize to
    /// equal rows regardless of their in-memory node ids.
    pub fn serialize(&self) -> Vec<IndexRow> {
        rows::to_rows(&self.arena, self.root)
    }

    /// Rebuilds a tree from serialized rows, validating the structure
    /// against `config` and the comparator. Malformed input fails with
    /// [`TreeError::StructuralCorruption`].
    pub fn deserialize(
        name: impl Into<String>,
        comparator: Box<dyn Comparator>,
        unique: bool,
        config: TreeConfig,
        input: &[IndexRow],
    ) -> Result<Self> {
        let (arena, root, total_rows) = rows::from_rows(&*comparator, &config, input)?;
        Ok(Self {
            name: name.into(),
            comparator,
            unique,
            config,
            arena,
            root,
            total_rows,
        })
    }

    /// Checks every structural invariant: arity, key order, separator
    /// bounds, occupancy, uniform leaf depth, parent and sibling links, and
    /// the row count. Meant for tests and debugging.
    pub fn verify(&self) -> Result<()> {
        let mut leaves = Vec::new();
        let mut total = 0;
        self.check_node(self.root, None, &mut leaves, &mut total)?;
        if total != self.total_rows {
            return Err(corrupt(format!(
                "row count {} does not match stored total {}",
                total, self.total_rows
            )));
        }

        let mut walker = Some(leaves[0]);
        let mut prev: Option<NodeId> = None;
        for &expected in &leaves {
            let id = walker.ok_or_else(|| corrupt("leaf chain ends early".into()))?;
            if id != expected {
                return Err(corrupt(format!(
                    "leaf chain visits {} where traversal expects {}",
                    id, expected
                )));
            }
            let node = self.arena.node(id);
            if node.prev != prev {
                return Err(corrupt(format!("bad prev link on leaf {}", id)));
            }
            prev = Some(id);
            walker = node.next;
        }
        if walker.is_some() {
            return Err(corrupt("leaf chain continues past the last leaf".into()));
        }
        Ok(())
    }

    /// Returns the leaf depth and key span of the subtree at `id`.
    fn check_node(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        leaves: &mut Vec<NodeId>,
        total: &mut usize,
    ) -> Result<(usize, Option<(Key, Key)>)> {
        let node = self.arena.node(id);
        if node.parent != parent {
            return Err(corrupt(format!("bad parent link on node {}", id)));
        }
        if node.keys.len() > self.config.max_key_len() {
            return Err(corrupt(format!("node {} overflows", id)));
        }
        if id != self.root && node.keys.len() < self.config.min_key_len() {
            return Err(corrupt(format!("node {} underflows", id)));
        }
        for pair in node.keys.windows(2) {
            if self.comparator.compare(&pair[0], &pair[1]) != Ordering::Less {
                return Err(corrupt(format!("unsorted keys in node {}", id)));
            }
        }

        match &node.contents {
            NodeContents::Leaf { values } => {
                if values.len() != node.keys.len() {
                    return Err(corrupt(format!("leaf {} arity mismatch", id)));
                }
                if values.iter().any(Vec::is_empty) {
                    return Err(corrupt(format!("empty value list in leaf {}", id)));
                }
                *total += values.iter().map(Vec::len).sum::<usize>();
                leaves.push(id);
                let span = node
                    .keys
                    .first()
                    .zip(node.keys.last())
                    .map(|(a, b)| (a.clone(), b.clone()));
                Ok((0, span))
            }
            NodeContents::Internal { children } => {
                if children.len() != node.keys.len() + 1 {
                    return Err(corrupt(format!("internal {} arity mismatch", id)));
                }
                let mut depth = None;
                let mut span: Option<(Key, Key)> = None;
                for (i, &child) in children.iter().enumerate() {
                    let (child_depth, child_span) =
                        self.check_node(child, Some(id), leaves, total)?;
                    match depth {
                        None => depth = Some(child_depth),
                        Some(d) if d != child_depth => {
                            return Err(corrupt(format!("uneven leaf depth under {}", id)))
                        }
                        _ => {}
                    }
                    let (child_min, child_max) = child_span
                        .ok_or_else(|| corrupt(format!("empty node under internal {}", id)))?;
                    if i > 0 {
                        let separator = &node.keys[i - 1];
                        if self.comparator.compare(separator, &child_min) == Ordering::Greater {
                            return Err(corrupt(format!(
                                "separator {} of node {} exceeds its right subtree",
                                separator, id
                            )));
                        }
                    }
                    if i < node.keys.len()
                        && self.comparator.compare(&child_max, &node.keys[i]) != Ordering::Less
                    {
                        return Err(corrupt(format!(
                            "separator {} of node {} not above its left subtree",
                            node.keys[i], id
                        )));
                    }
                    span = match span {
                        None => Some((child_min, child_max)),
                        Some((min, _)) => Some((min, child_max)),
                    };
                }
                Ok((depth.unwrap_or(0) + 1, span))
            }
        }
    }

    /// Descends to the leaf that owns `key`. Keys equal to a separator live
    /// in the child on the separator's right.
    fn find_leaf(&self, key: &Key) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.arena.node(current);
            if node.is_leaf() {
                return current;
            }
            let idx = super::node::upper_bound(&node.keys, &*self.comparator, key);
            current = node.children()[idx];
        }
    }

    /// Descends to the leaf holding the first key at or past `probe` in
    /// comparator order.
    fn seek_leaf_by_bound(&self, probe: &Scalar) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.arena.node(current);
            if node.is_leaf() {
                return current;
            }
            let keys = &node.keys;
            let mut left = 0;
            let mut right = keys.len();
            while left < right {
                let mid = left + (right - left) / 2;
                if self.comparator.compare_bound(probe, &keys[mid]) == Ordering::Less {
                    right = mid;
                } else {
                    left = mid + 1;
                }
            }
            current = node.children()[left];
        }
    }

    /// Ascending cursor positioned at the first key `>= probe` in comparator
    /// order, or at the leftmost slot when `probe` is `None`.
    fn seek_start(&self, probe: Option<&Scalar>) -> SlotCursor<'_> {
        match probe {
            None => SlotCursor::ascending(&self.arena, self.edge_leaf(false), 0),
            Some(p) => {
                let leaf = self.seek_leaf_by_bound(p);
                let node = self.arena.node(leaf);
                let slot = node
                    .keys
                    .iter()
                    .position(|k| self.comparator.compare_bound(p, k) != Ordering::Greater)
                    .unwrap_or(node.keys.len());
                SlotCursor::ascending(&self.arena, leaf, slot)
            }
        }
    }

    /// Descending cursor positioned at the last key `<= probe` in comparator
    /// order, or at the rightmost slot when `probe` is `None`.
    fn seek_end(&self, probe: Option<&Scalar>) -> SlotCursor<'_> {
        match probe {
            None => {
                let leaf = self.edge_leaf(true);
                let end = self.arena.node(leaf).keys.len();
                SlotCursor::descending(&self.arena, leaf, end)
            }
            Some(p) => {
                let leaf = self.seek_leaf_by_bound(p);
                let node = self.arena.node(leaf);
                let end = node
                    .keys
                    .iter()
                    .position(|k| self.comparator.compare_bound(p, k) == Ordering::Less)
                    .unwrap_or(node.keys.len());
                SlotCursor::descending(&self.arena, leaf, end)
            }
        }
    }

    fn edge_leaf(&self, rightmost: bool) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.arena.node(current);
            if node.is_leaf() {
                return current;
            }
            let children = node.children();
            current = if rightmost {
                children[children.len() - 1]
            } else {
                children[0]
            };
        }
    }
}

fn corrupt(message: String) -> TreeError {
    TreeError::StructuralCorruption(message)
}

/// Structural dump: two lines per level, top down. The first line lists each
/// node as `id[key|key]`, the second as `prev{contents}parent` with `_` for a
/// missing link; internal contents are child ids joined by `|`, leaf contents
/// are value lists joined by `/` with values joined by `,`.
impl fmt::Display for BTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut level_start = Some(self.root);
        while let Some(start) = level_start {
            let mut key_line = String::new();
            let mut link_line = String::new();
            let mut walker = Some(start);
            while let Some(id) = walker {
                let node = self.arena.node(id);
                if !key_line.is_empty() {
                    key_line.push_str("  ");
                    link_line.push_str("  ");
                }
                let keys = node
                    .keys
                    .iter()
                    .map(Key::to_string)
                    .collect::<Vec<_>>()
                    .join("|");
                key_line.push_str(&format!("{}[{}]", id, keys));

                let prev = link_or_blank(node.prev);
                let parent = link_or_blank(node.parent);
                let contents = match &node.contents {
                    NodeContents::Internal { children } => children
                        .iter()
                        .map(NodeId::to_string)
                        .collect::<Vec<_>>()
                        .join("|"),
                    NodeContents::Leaf { values } => values
                        .iter()
                        .map(|list| {
                            list.iter()
                                .map(|row| row.as_u64().to_string())
                                .collect::<Vec<_>>()
                                .join(",")
                        })
                        .collect::<Vec<_>>()
                        .join("/"),
                };
                link_line.push_str(&format!("{}{{{}}}{}", prev, contents, parent));
                walker = node.next;
            }
            writeln!(f, "{}", key_line)?;
            writeln!(f, "{}", link_line)?;

            let start_node = self.arena.node(start);
            level_start = match &start_node.contents {
                NodeContents::Internal { children } => Some(children[0]),
                NodeContents::Leaf { .. } => None,
            };
        }
        Ok(())
    }
}

fn link_or_blank(link: Option<NodeId>) -> String {
    match link {
        Some(id) => id.to_string(),
        None => "_".to_owned(),
    }
}
