//! B+Tree index structures: keys and comparators, the node arena, and the
//! [`BTree`] facade with its row serialization boundary.

pub mod btree;
pub mod comparator;
pub mod key;
pub mod key_range;
pub mod rows;

mod iterator;
mod node;

pub use btree::{BTree, IndexStats};
pub use comparator::{Comparator, MultiComparator, Order, SimpleComparator};
pub use key::{Key, Scalar};
pub use key_range::KeyRange;
pub use rows::{IndexRow, NodePayload};
