/// Default B+Tree fan-out (max children per internal node)
pub const DEFAULT_MAX_COUNT: usize = 128;

/// Smallest fan-out for which the split and rebalance arithmetic is sound
pub const MIN_SUPPORTED_MAX_COUNT: usize = 4;

/// Construction-time fan-out configuration of one tree instance.
///
/// Bounds are fixed per tree, never process-global, so tests can build small
/// trees without touching any shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    max_count: usize,
}

impl TreeConfig {
    /// Configuration with a specific fan-out. `max_count` below the supported
    /// minimum is clamped.
    pub fn with_order(max_count: usize) -> Self {
        Self {
            max_count: max_count.max(MIN_SUPPORTED_MAX_COUNT),
        }
    }

    /// Fan-out: maximum children per internal node.
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Maximum keys a node may hold before it must split.
    pub fn max_key_len(&self) -> usize {
        self.max_count - 1
    }

    /// Minimum keys a non-root node may hold before it must rebalance.
    ///
    /// `(max_count - 1) / 2` is the one floor that works at every order:
    /// an internal split leaves `max_count - min_key_len - 1 >= min_key_len`
    /// keys on the right, and an internal merge produces at most
    /// `2 * min_key_len <= max_key_len` keys, for odd and even fan-outs
    /// alike.
    pub fn min_key_len(&self) -> usize {
        (self.max_count - 1) / 2
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::with_order(DEFAULT_MAX_COUNT)
    }
}
