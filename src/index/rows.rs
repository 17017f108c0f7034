//! Row-per-node serialization of a tree.
//!
//! A serialized tree is a flat list of [`IndexRow`]s whose ids are assigned
//! in preorder starting at 0, so the row list is canonical for a given tree
//! shape. Deserialization trusts nothing: every structural invariant is
//! checked before a tree is handed back.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::{NodeId, Result, RowId, TreeConfig, TreeError};

use super::comparator::Comparator;
use super::key::Key;
use super::node::{Arena, NodeContents};

/// One serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub id: u64,
    pub payload: NodePayload,
}

/// Serialized node contents. Leaf `next` links and internal `children` refer
/// to other rows by id; the root is the one row no other row references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodePayload {
    Leaf {
        keys: Vec<Key>,
        values: Vec<Vec<RowId>>,
        next: Option<u64>,
    },
    Internal {
        keys: Vec<Key>,
        children: Vec<u64>,
    },
}

/// Flattens the subtree at `root` into rows with preorder ids.
pub(crate) fn to_rows(arena: &Arena, root: NodeId) -> Vec<IndexRow> {
    let mut order = Vec::new();
    let mut ids = HashMap::new();
    assign_preorder(arena, root, &mut order, &mut ids);

    order
        .iter()
        .map(|&node_id| {
            let node = arena.node(node_id);
            let payload = match &node.contents {
                NodeContents::Leaf { values } => NodePayload::Leaf {
                    keys: node.keys.clone(),
                    values: values.clone(),
                    next: node.next.map(|n| ids[&n]),
                },
                NodeContents::Internal { children } => NodePayload::Internal {
                    keys: node.keys.clone(),
                    children: children.iter().map(|c| ids[c]).collect(),
                },
            };
            IndexRow {
                id: ids[&node_id],
                payload,
            }
        })
        .collect()
}

fn assign_preorder(
    arena: &Arena,
    id: NodeId,
    order: &mut Vec<NodeId>,
    ids: &mut HashMap<NodeId, u64>,
) {
    ids.insert(id, order.len() as u64);
    order.push(id);
    if let NodeContents::Internal { children } = &arena.node(id).contents {
        for &child in children {
            assign_preorder(arena, child, order, ids);
        }
    }
}

/// Validates `input` and rebuilds the arena. Returns the arena, the root id
/// and the total row count.
pub(crate) fn from_rows(
    cmp: &dyn Comparator,
    cfg: &TreeConfig,
    input: &[IndexRow],
) -> Result<(Arena, NodeId, usize)> {
    if input.is_empty() {
        return Err(corrupt("no rows".to_owned()));
    }

    let mut by_id = HashMap::with_capacity(input.len());
    for row in input {
        if by_id.insert(row.id, row).is_some() {
            return Err(corrupt(format!("duplicate row id {}", row.id)));
        }
    }

    let mut referenced: HashMap<u64, u32> = HashMap::new();
    for row in input {
        if let NodePayload::Internal { children, .. } = &row.payload {
            for &child in children {
                *referenced.entry(child).or_insert(0) += 1;
            }
        }
    }
    if let Some((&id, _)) = referenced.iter().find(|(_, n)| **n > 1) {
        return Err(corrupt(format!("row {} has multiple parents", id)));
    }

    let mut roots = input.iter().filter(|row| !referenced.contains_key(&row.id));
    let root_row = roots
        .next()
        .ok_or_else(|| corrupt("no unreferenced root row".to_owned()))?;
    if let Some(extra) = roots.next() {
        return Err(corrupt(format!(
            "multiple root rows: {} and {}",
            root_row.id, extra.id
        )));
    }

    let mut reader = RowReader {
        cmp,
        cfg,
        by_id,
        arena: Arena::new(),
        levels: Vec::new(),
        leaf_order: Vec::new(),
        total_rows: 0,
    };
    let (root, _, _) = reader.build(root_row.id, 0)?;

    if reader.arena.len() != input.len() {
        return Err(corrupt(format!(
            "{} rows unreachable from root {}",
            input.len() - reader.arena.len(),
            root_row.id
        )));
    }

    // The stored next links must agree with left-to-right leaf order.
    for (i, &leaf_row) in reader.leaf_order.iter().enumerate() {
        let expected = reader.leaf_order.get(i + 1).copied();
        let stored = match &reader.by_id[&leaf_row].payload {
            NodePayload::Leaf { next, .. } => *next,
            NodePayload::Internal { .. } => unreachable!("leaf_order only holds leaves"),
        };
        if stored != expected {
            return Err(corrupt(format!("leaf row {} has a wrong next link", leaf_row)));
        }
    }

    for level in &reader.levels {
        for pair in level.windows(2) {
            reader.arena.node_mut(pair[0]).next = Some(pair[1]);
            reader.arena.node_mut(pair[1]).prev = Some(pair[0]);
        }
    }

    Ok((reader.arena, root, reader.total_rows))
}

struct RowReader<'a> {
    cmp: &'a dyn Comparator,
    cfg: &'a TreeConfig,
    by_id: HashMap<u64, &'a IndexRow>,
    arena: Arena,
    levels: Vec<Vec<NodeId>>,
    leaf_order: Vec<u64>,
    total_rows: usize,
}

impl<'a> RowReader<'a> {
    /// Rebuilds the subtree of one row. Returns the node, its leaf depth and
    /// its key span; an empty root leaf has no span.
    fn build(&mut self, row_id: u64, depth: usize) -> Result<(NodeId, usize, Option<(Key, Key)>)> {
        let row = *self
            .by_id
            .get(&row_id)
            .ok_or_else(|| corrupt(format!("referenced row {} is missing", row_id)))?;

        match &row.payload {
            NodePayload::Leaf { keys, values, .. } => {
                if values.len() != keys.len() {
                    return Err(corrupt(format!("leaf row {} arity mismatch", row_id)));
                }
                if keys.is_empty() && depth != 0 {
                    return Err(corrupt(format!("empty non-root leaf row {}", row_id)));
                }
                if values.iter().any(Vec::is_empty) {
                    return Err(corrupt(format!("empty value list in leaf row {}", row_id)));
                }
                self.check_keys(keys, row_id)?;

                let id = self.arena.alloc_leaf();
                let node = self.arena.node_mut(id);
                node.keys = keys.clone();
                node.contents = NodeContents::Leaf {
                    values: values.clone(),
                };
                self.record_level(depth, id);
                self.leaf_order.push(row_id);
                self.total_rows += values.iter().map(Vec::len).sum::<usize>();

                let span = keys
                    .first()
                    .zip(keys.last())
                    .map(|(a, b)| (a.clone(), b.clone()));
                Ok((id, depth, span))
            }
            NodePayload::Internal { keys, children } => {
                if children.len() != keys.len() + 1 {
                    return Err(corrupt(format!("internal row {} arity mismatch", row_id)));
                }
                if children.len() < 2 {
                    return Err(corrupt(format!(
                        "internal row {} with a single child",
                        row_id
                    )));
                }
                self.check_keys(keys, row_id)?;

                let id = self.arena.alloc(NodeContents::Internal {
                    children: Vec::new(),
                });
                self.arena.node_mut(id).keys = keys.clone();
                self.record_level(depth, id);

                let mut leaf_depth = None;
                let mut span: Option<(Key, Key)> = None;
                for (i, &child_row) in children.iter().enumerate() {
                    let (child_id, child_leaf_depth, child_span) =
                        self.build(child_row, depth + 1)?;
                    self.arena.node_mut(child_id).parent = Some(id);
                    self.arena.node_mut(id).children_mut().push(child_id);

                    match leaf_depth {
                        None => leaf_depth = Some(child_leaf_depth),
                        Some(d) if d != child_leaf_depth => {
                            return Err(corrupt(format!(
                                "uneven leaf depth under row {}",
                                row_id
                            )))
                        }
                        _ => {}
                    }

                    let (child_min, child_max) = child_span.ok_or_else(|| {
                        corrupt(format!("empty subtree under internal row {}", row_id))
                    })?;
                    if i > 0 && self.cmp.compare(&keys[i - 1], &child_min) == Ordering::Greater {
                        return Err(corrupt(format!(
                            "separator {} of row {} exceeds its right subtree",
                            keys[i - 1],
                            row_id
                        )));
                    }
                    if i < keys.len()
                        && self.cmp.compare(&child_max, &keys[i]) != Ordering::Less
                    {
                        return Err(corrupt(format!(
                            "separator {} of row {} not above its left subtree",
                            keys[i], row_id
                        )));
                    }
                    span = match span {
                        None => Some((child_min, child_max)),
                        Some((min, _)) => Some((min, child_max)),
                    };
                }
                let leaf_depth = leaf_depth.expect("internal node has children");
                Ok((id, leaf_depth, span))
            }
        }
    }

    fn check_keys(&self, keys: &[Key], row_id: u64) -> Result<()> {
        if keys.len() > self.cfg.max_key_len() {
            return Err(corrupt(format!(
                "row {} holds {} keys, limit is {}",
                row_id,
                keys.len(),
                self.cfg.max_key_len()
            )));
        }
        for pair in keys.windows(2) {
            if self.cmp.compare(&pair[0], &pair[1]) != Ordering::Less {
                return Err(corrupt(format!("unsorted keys in row {}", row_id)));
            }
        }
        Ok(())
    }

    fn record_level(&mut self, depth: usize, id: NodeId) {
        while self.levels.len() <= depth {
            self.levels.push(Vec::new());
        }
        self.levels[depth].push(id);
    }
}

fn corrupt(message: String) -> TreeError {
    TreeError::StructuralCorruption(message)
}
