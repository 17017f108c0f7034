use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::key::{Key, Scalar};
use super::key_range::KeyRange;

/// Sort direction of one key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        }
    }
}

/// Total order over index keys plus the range predicates the tree needs.
///
/// All methods are pure; comparators carry only their direction
/// configuration. `compare` and `compare_bound` work in comparator order
/// (directions applied), while `is_in_range` works in value space.
pub trait Comparator: Send + Sync {
    /// Three-way comparison of two keys in comparator order.
    fn compare(&self, a: &Key, b: &Key) -> Ordering;

    /// Whether a key satisfies every supplied per-field range. Missing
    /// trailing ranges are unbounded.
    fn is_in_range(&self, key: &Key, ranges: &[KeyRange]) -> bool;

    /// Position of the key relative to `range` over the first field, in
    /// comparator order: `Less` before the range, `Equal` inside it,
    /// `Greater` past it. Drives scan termination.
    fn compare_range(&self, key: &Key, range: &KeyRange) -> Ordering;

    /// Directional (start, end) probe values for the first field, in
    /// comparator order. `None` means the scan starts or ends at the edge of
    /// the tree.
    fn bound_points(&self, range: &KeyRange) -> (Option<Scalar>, Option<Scalar>);

    /// Comparison of a first-field probe value against a stored key, in
    /// comparator order. Drives the binary-search descent to a start leaf.
    fn compare_bound(&self, bound: &Scalar, key: &Key) -> Ordering;

    /// The smaller of two keys in comparator order.
    fn min<'a>(&self, a: &'a Key, b: &'a Key) -> &'a Key {
        if self.compare(a, b) == Ordering::Greater {
            b
        } else {
            a
        }
    }

    /// The larger of two keys in comparator order.
    fn max<'a>(&self, a: &'a Key, b: &'a Key) -> &'a Key {
        if self.compare(a, b) == Ordering::Less {
            b
        } else {
            a
        }
    }

    /// Equality under this comparator.
    fn equal(&self, a: &Key, b: &Key) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Comparator over single-field keys with one direction.
#[derive(Debug, Clone, Copy)]
pub struct SimpleComparator {
    order: Order,
}

impl SimpleComparator {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

impl Comparator for SimpleComparator {
    fn compare(&self, a: &Key, b: &Key) -> Ordering {
        self.order.apply(a.field(0).cmp_scalar(b.field(0)))
    }

    fn is_in_range(&self, key: &Key, ranges: &[KeyRange]) -> bool {
        match ranges.first() {
            Some(range) => range.contains(key.field(0)),
            None => true,
        }
    }

    fn compare_range(&self, key: &Key, range: &KeyRange) -> Ordering {
        self.order.apply(range.position(key.field(0)))
    }

    fn bound_points(&self, range: &KeyRange) -> (Option<Scalar>, Option<Scalar>) {
        match self.order {
            Order::Asc => (range.lower.clone(), range.upper.clone()),
            Order::Desc => (range.upper.clone(), range.lower.clone()),
        }
    }

    fn compare_bound(&self, bound: &Scalar, key: &Key) -> Ordering {
        self.order.apply(bound.cmp_scalar(key.field(0)))
    }
}

/// Comparator over composite keys, lexicographic with a direction per field.
///
/// Field comparisons short-circuit at the first non-equal field.
#[derive(Debug, Clone)]
pub struct MultiComparator {
    orders: Vec<Order>,
}

impl MultiComparator {
    pub fn new(orders: Vec<Order>) -> Self {
        assert!(!orders.is_empty(), "composite comparator needs fields");
        Self { orders }
    }

    /// `count` fields sharing one direction.
    pub fn uniform(count: usize, order: Order) -> Self {
        Self::new(vec![order; count])
    }
}

impl Comparator for MultiComparator {
    fn compare(&self, a: &Key, b: &Key) -> Ordering {
        for (i, order) in self.orders.iter().enumerate() {
            let ordering = order.apply(a.field(i).cmp_scalar(b.field(i)));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn is_in_range(&self, key: &Key, ranges: &[KeyRange]) -> bool {
        ranges
            .iter()
            .take(key.field_count())
            .enumerate()
            .all(|(i, range)| range.contains(key.field(i)))
    }

    fn compare_range(&self, key: &Key, range: &KeyRange) -> Ordering {
        self.orders[0].apply(range.position(key.field(0)))
    }

    fn bound_points(&self, range: &KeyRange) -> (Option<Scalar>, Option<Scalar>) {
        match self.orders[0] {
            Order::Asc => (range.lower.clone(), range.upper.clone()),
            Order::Desc => (range.upper.clone(), range.lower.clone()),
        }
    }

    fn compare_bound(&self, bound: &Scalar, key: &Key) -> Ordering {
        self.orders[0].apply(bound.cmp_scalar(key.field(0)))
    }
}
