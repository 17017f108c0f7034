use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::key::Scalar;

/// A one-dimensional interval over a single key field.
///
/// Either bound may be absent (unbounded on that side). Containment is always
/// evaluated in value space; comparator direction only affects the order in
/// which matching keys are visited, never whether a key matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRange {
    pub lower: Option<Scalar>,
    pub upper: Option<Scalar>,
    pub lower_exclusive: bool,
    pub upper_exclusive: bool,
}

impl KeyRange {
    /// The fully unbounded range.
    pub fn all() -> Self {
        Self {
            lower: None,
            upper: None,
            lower_exclusive: false,
            upper_exclusive: false,
        }
    }

    /// Degenerate exact-match range: lower = upper = `v`, both inclusive.
    pub fn only(v: impl Into<Scalar>) -> Self {
        let v = v.into();
        Self {
            lower: Some(v.clone()),
            upper: Some(v),
            lower_exclusive: false,
            upper_exclusive: false,
        }
    }

    /// Range bounded below only.
    pub fn lower_bound(v: impl Into<Scalar>, exclusive: bool) -> Self {
        Self {
            lower: Some(v.into()),
            upper: None,
            lower_exclusive: exclusive,
            upper_exclusive: false,
        }
    }

    /// Range bounded above only.
    pub fn upper_bound(v: impl Into<Scalar>, exclusive: bool) -> Self {
        Self {
            lower: None,
            upper: Some(v.into()),
            lower_exclusive: false,
            upper_exclusive: exclusive,
        }
    }

    /// Fully specified range.
    pub fn between(
        lower: impl Into<Scalar>,
        upper: impl Into<Scalar>,
        lower_exclusive: bool,
        upper_exclusive: bool,
    ) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: Some(upper.into()),
            lower_exclusive,
            upper_exclusive,
        }
    }

    /// Whether `v` lies inside this range. An absent bound is always
    /// satisfied on that side.
    pub fn contains(&self, v: &Scalar) -> bool {
        self.position(v) == Ordering::Equal
    }

    /// Value-space position of `v` relative to this range: `Less` when below
    /// the lower bound, `Greater` when above the upper bound, `Equal` inside.
    pub fn position(&self, v: &Scalar) -> Ordering {
        if let Some(lower) = &self.lower {
            match v.cmp_scalar(lower) {
                Ordering::Less => return Ordering::Less,
                Ordering::Equal if self.lower_exclusive => return Ordering::Less,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match v.cmp_scalar(upper) {
                Ordering::Greater => return Ordering::Greater,
                Ordering::Equal if self.upper_exclusive => return Ordering::Greater,
                _ => {}
            }
        }
        Ordering::Equal
    }
}
