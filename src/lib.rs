//! Treeline - An in-memory B+Tree index core for an embedded relational engine
//!
//! This crate provides the ordered index used by an embedded relational engine
//! to answer equality and range lookups, enforce uniqueness constraints, and
//! estimate query costs. The tree is fully materialized in memory; a flat row
//! representation exists only to hand nodes to an external persistence layer.
//!
//! # Architecture
//!
//! The crate is organized into two layers:
//!
//! - **Common** (`common`): shared primitives
//!   - `NodeId`/`RowId`: stable node identity and opaque value handles
//!   - `TreeError`: error type for uniqueness and corruption failures
//!   - `TreeConfig`: construction-time fan-out configuration
//!
//! - **Index** (`index`): the B+Tree itself
//!   - `BTree`: facade over insertion, deletion, lookup and range scans
//!   - `SimpleComparator`/`MultiComparator`: single- and composite-key orders
//!   - `KeyRange`: one-dimensional bounded/unbounded intervals
//!   - `IndexRow`: the serialization row handed to storage backends
//!
//! # Example
//!
//! ```rust
//! use treeline::common::RowId;
//! use treeline::index::{BTree, KeyRange, Order, SimpleComparator};
//!
//! // A unique index over ascending integer keys.
//! let comparator = Box::new(SimpleComparator::new(Order::Asc));
//! let mut index = BTree::new("employee.id", comparator, true);
//!
//! index.add(3, RowId::new(30)).unwrap();
//! index.add(1, RowId::new(10)).unwrap();
//! index.add(2, RowId::new(20)).unwrap();
//!
//! assert_eq!(index.get(2), vec![RowId::new(20)]);
//!
//! // Range scan: keys >= 2, ascending.
//! let hits = index.get_range(
//!     Some(&[KeyRange::lower_bound(2, false)]),
//!     false,
//!     None,
//!     None,
//! );
//! assert_eq!(hits, vec![RowId::new(20), RowId::new(30)]);
//! ```

pub mod common;
pub mod index;

// Re-export commonly used types at the crate root
pub use common::{NodeId, Result, RowId, TreeError};
pub use index::{BTree, Comparator, Key, KeyRange, Order, Scalar};
