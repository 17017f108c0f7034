use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single orderable key field.
///
/// The tree only ever orders scalars through a comparator; the cross-variant
/// rule (numbers before text) exists solely to keep the ordering total when a
/// caller mixes field types in one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    pub fn cmp_scalar(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            (Scalar::Int(_), Scalar::Text(_)) => Ordering::Less,
            (Scalar::Text(_), Scalar::Int(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// An index key: either one scalar or a fixed-length tuple of scalars.
///
/// Keys are opaque to the tree itself; all ordering decisions go through a
/// [`Comparator`](super::Comparator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Single(Scalar),
    Composite(Vec<Scalar>),
}

impl Key {
    /// Number of fields in this key.
    pub fn field_count(&self) -> usize {
        match self {
            Key::Single(_) => 1,
            Key::Composite(fields) => fields.len(),
        }
    }

    /// The field at position `i`. Comparators only ask for fields that their
    /// order list covers.
    pub fn field(&self, i: usize) -> &Scalar {
        match self {
            Key::Single(scalar) => {
                assert_eq!(i, 0, "single-field key has no field {}", i);
                scalar
            }
            Key::Composite(fields) => &fields[i],
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Single(scalar) => write!(f, "{}", scalar),
            Key::Composite(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", field)?;
                }
                Ok(())
            }
        }
    }
}

impl From<Scalar> for Key {
    fn from(v: Scalar) -> Self {
        Key::Single(v)
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Single(Scalar::Int(v))
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Single(Scalar::from(v))
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Single(Scalar::Text(v))
    }
}

impl From<Vec<Scalar>> for Key {
    fn from(fields: Vec<Scalar>) -> Self {
        Key::Composite(fields)
    }
}

impl<A: Into<Scalar>, B: Into<Scalar>> From<(A, B)> for Key {
    fn from((a, b): (A, B)) -> Self {
        Key::Composite(vec![a.into(), b.into()])
    }
}

impl<A: Into<Scalar>, B: Into<Scalar>, C: Into<Scalar>> From<(A, B, C)> for Key {
    fn from((a, b, c): (A, B, C)) -> Self {
        Key::Composite(vec![a.into(), b.into(), c.into()])
    }
}
