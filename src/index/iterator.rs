use crate::common::{NodeId, RowId};

use super::key::Key;
use super::node::Arena;

/// Cursor over the leaf sibling chain, yielding one key slot at a time.
///
/// Range scans position a cursor at their start slot and walk until the
/// comparator reports the end of the range; the cursor itself knows nothing
/// about ranges.
pub(crate) struct SlotCursor<'a> {
    arena: &'a Arena,
    node: Option<NodeId>,
    // Ascending: index of the next slot to yield. Descending: one past it,
    // so 0 means the node is exhausted.
    slot: usize,
    descending: bool,
}

impl<'a> SlotCursor<'a> {
    /// Cursor walking left to right, starting at `slot` of `start`.
    pub fn ascending(arena: &'a Arena, start: NodeId, slot: usize) -> Self {
        Self {
            arena,
            node: Some(start),
            slot,
            descending: false,
        }
    }

    /// Cursor walking right to left. `end` is one past the first slot to
    /// yield; 0 starts at the previous leaf.
    pub fn descending(arena: &'a Arena, start: NodeId, end: usize) -> Self {
        Self {
            arena,
            node: Some(start),
            slot: end,
            descending: true,
        }
    }
}

impl<'a> Iterator for SlotCursor<'a> {
    type Item = (&'a Key, &'a [RowId]);

    fn next(&mut self) -> Option<Self::Item> {
        let arena = self.arena;
        loop {
            let node = arena.node(self.node?);
            if self.descending {
                if self.slot > 0 && self.slot <= node.keys.len() {
                    self.slot -= 1;
                    return Some((&node.keys[self.slot], node.values()[self.slot].as_slice()));
                }
                self.node = node.prev;
                self.slot = self
                    .node
                    .map(|prev| arena.node(prev).keys.len())
                    .unwrap_or(0);
            } else {
                if self.slot < node.keys.len() {
                    let item = (&node.keys[self.slot], node.values()[self.slot].as_slice());
                    self.slot += 1;
                    return Some(item);
                }
                self.node = node.next;
                self.slot = 0;
            }
        }
    }
}
