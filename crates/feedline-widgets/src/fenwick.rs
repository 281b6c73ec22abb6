//! Fenwick tree (binary indexed tree) over row extents.
//!
//! Stores one `u64` weight per row and answers "where does row `i` start"
//! and "which row covers offset `y`" in O(log n). The row-height cache keeps
//! one of these in sync with its measurements so scroll math never walks the
//! whole list.
//!
//! # Invariants
//!
//! 1. `tree[k]` holds the sum of the `lowbit(k)` weights ending at row `k - 1`.
//! 2. `prefix_sum(len()) == total()`.
//! 3. `grow` keeps existing weights; `truncate` drops rows from the end.

/// Prefix sums over per-row weights.
#[derive(Debug, Clone, Default)]
pub struct FenwickTree {
    /// 1-indexed storage, `tree[0]` unused.
    tree: Vec<u64>,
    /// Plain copy of the weights, for O(1) point reads and O(n) rebuilds.
    values: Vec<u64>,
}

impl FenwickTree {
    /// An empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: vec![0],
            values: Vec::new(),
        }
    }

    /// Build from weights in O(n).
    #[must_use]
    pub fn from_values(values: &[u64]) -> Self {
        let mut ft = Self {
            tree: Vec::new(),
            values: values.to_vec(),
        };
        ft.rebuild();
        ft
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when there are no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Weight of row `i`.
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> u64 {
        self.values[i]
    }

    /// Replace the weight of row `i`. O(log n).
    ///
    /// # Panics
    /// Panics if `i >= len()`.
    pub fn set(&mut self, i: usize, value: u64) {
        let old = self.values[i];
        if old == value {
            return;
        }
        self.values[i] = value;
        let n = self.values.len();
        let mut k = i + 1;
        while k <= n {
            // Wrapping keeps the subtraction exact for decreases.
            self.tree[k] = self.tree[k].wrapping_add(value).wrapping_sub(old);
            k += lowbit(k);
        }
    }

    /// Sum of the weights of rows `[0, end)`. O(log n).
    ///
    /// `end` is clamped to `len()`.
    #[must_use]
    pub fn prefix_sum(&self, end: usize) -> u64 {
        let mut k = end.min(self.values.len());
        let mut sum = 0u64;
        while k > 0 {
            sum = sum.wrapping_add(self.tree[k]);
            k -= lowbit(k);
        }
        sum
    }

    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prefix_sum(self.values.len())
    }

    /// Row whose span `[prefix_sum(i), prefix_sum(i + 1))` contains `offset`.
    ///
    /// Offsets at or past the total map to the last row. Returns `None` only
    /// for an empty tree. O(log n).
    #[must_use]
    pub fn row_at(&self, offset: u64) -> Option<usize> {
        let n = self.values.len();
        if n == 0 {
            return None;
        }
        // Binary lifting: find the largest `pos` with prefix_sum(pos) <= offset.
        let mut pos = 0usize;
        let mut remaining = offset;
        let mut step = most_significant_bit(n);
        while step > 0 {
            let next = pos + step;
            if next <= n && self.tree[next] <= remaining {
                remaining -= self.tree[next];
                pos = next;
            }
            step >>= 1;
        }
        // Zero-weight rows at `pos` are skipped by the loop above; `pos` is the
        // number of rows fully above `offset`.
        Some(pos.min(n - 1))
    }

    /// Append `count` rows of weight `value`.
    pub fn grow(&mut self, count: usize, value: u64) {
        if count == 0 {
            return;
        }
        self.values.resize(self.values.len() + count, value);
        self.rebuild();
    }

    /// Keep only the first `len` rows.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.values.len() {
            return;
        }
        self.values.truncate(len);
        self.rebuild();
    }

    /// Drop every row.
    pub fn clear(&mut self) {
        self.values.clear();
        self.tree.clear();
        self.tree.push(0);
    }

    fn rebuild(&mut self) {
        let n = self.values.len();
        self.tree.clear();
        self.tree.resize(n + 1, 0);
        self.tree[1..].copy_from_slice(&self.values);
        for k in 1..=n {
            let parent = k + lowbit(k);
            if parent <= n {
                self.tree[parent] = self.tree[parent].wrapping_add(self.tree[k]);
            }
        }
    }
}

/// Lowest set bit: `lowbit(6) == 2`.
#[inline]
fn lowbit(x: usize) -> usize {
    x & x.wrapping_neg()
}

/// Largest power of two not exceeding `n`.
#[inline]
fn most_significant_bit(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}
