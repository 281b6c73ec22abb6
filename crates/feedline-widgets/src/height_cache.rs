#![forbid(unsafe_code)]

//! Write-once cache of measured row heights.
//!
//! # Invariants
//!
//! 1. **First measurement wins**: once index `i` is recorded, later
//!    `record_height(i, _)` calls are ignored until the cache is cleared.
//! 2. **Shrink invalidation**: when the item count drops below the last seen
//!    count, every measurement is discarded (indices no longer refer to the
//!    same items). Growth keeps measurements.
//! 3. The extent tree always holds, for every tracked row, the measured
//!    height or the estimate, so `offset_of` and `index_at_offset` agree with
//!    `height`.

use feedline_core::FeedConfig;

use crate::fenwick::FenwickTree;
use crate::window::RowHeights;

/// Measured row heights with O(log n) offset queries.
#[derive(Debug, Clone)]
pub struct RowHeightCache {
    measured: Vec<Option<u32>>,
    extents: FenwickTree,
    estimate: u32,
    previous_count: usize,
}

impl Default for RowHeightCache {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RowHeightCache {
    /// Create a cache whose unmeasured rows are assumed `estimate` tall.
    #[must_use]
    pub fn new(estimate: u32) -> Self {
        Self {
            measured: Vec::new(),
            extents: FenwickTree::new(),
            estimate,
            previous_count: 0,
        }
    }

    /// Cache using the configured row-height estimate.
    #[must_use]
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.default_row_height)
    }

    /// Height of `index`, or `default` when it has not been measured.
    #[must_use]
    pub fn height(&self, index: usize, default: u32) -> u32 {
        self.measured
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(default)
    }

    /// Whether `index` has a measurement.
    #[must_use]
    pub fn is_measured(&self, index: usize) -> bool {
        matches!(self.measured.get(index), Some(Some(_)))
    }

    /// Record the first measurement of `index`.
    ///
    /// Returns `true` if the value was stored, `false` if `index` already had
    /// a measurement.
    pub fn record_height(&mut self, index: usize, height: u32) -> bool {
        if self.is_measured(index) {
            return false;
        }
        self.track_rows(index + 1);
        self.measured[index] = Some(height);
        self.extents.set(index, u64::from(height));
        #[cfg(feature = "tracing")]
        tracing::trace!(index, height, "row height recorded");
        true
    }

    /// Compare `count` with the last seen item count, clearing everything if
    /// it shrank. Returns `true` when the cache was cleared.
    pub fn invalidate_if_shrunk(&mut self, count: usize) -> bool {
        let shrunk = count < self.previous_count;
        if shrunk {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                previous = self.previous_count,
                current = count,
                "item count shrank, clearing row heights"
            );
            self.measured.clear();
            self.extents.clear();
        }
        self.previous_count = count;
        shrunk
    }

    /// Last item count passed to [`invalidate_if_shrunk`](Self::invalidate_if_shrunk).
    #[must_use]
    pub fn previous_count(&self) -> usize {
        self.previous_count
    }

    /// Number of measured rows.
    #[must_use]
    pub fn measured_count(&self) -> usize {
        self.measured.iter().filter(|h| h.is_some()).count()
    }

    /// Estimate used for unmeasured rows.
    #[must_use]
    pub fn estimate(&self) -> u32 {
        self.estimate
    }

    /// Drop every measurement and the remembered count.
    pub fn clear(&mut self) {
        self.measured.clear();
        self.extents.clear();
        self.previous_count = 0;
    }

    /// Make sure the extent tree covers `rows` rows, filling with the estimate.
    fn track_rows(&mut self, rows: usize) {
        let tracked = self.measured.len();
        if rows > tracked {
            self.measured.resize(rows, None);
            self.extents.grow(rows - tracked, u64::from(self.estimate));
        }
    }

    /// Offset of `index` within a list of `row_count` rows.
    fn offset_within(&self, index: usize, row_count: usize) -> u64 {
        let index = index.min(row_count);
        let tracked = self.extents.len().min(index);
        let untracked = (index - tracked) as u64;
        self.extents.prefix_sum(tracked) + untracked * u64::from(self.estimate)
    }
}

impl RowHeights for RowHeightCache {
    fn height(&self, index: usize) -> u32 {
        RowHeightCache::height(self, index, self.estimate)
    }

    fn offset_of(&self, index: usize, row_count: usize) -> u64 {
        self.offset_within(index, row_count)
    }

    fn index_at_offset(&self, offset: u64, row_count: usize) -> usize {
        if row_count == 0 {
            return 0;
        }
        let tracked = self.extents.len().min(row_count);
        let tracked_extent = self.extents.prefix_sum(tracked);
        if tracked > 0 && offset < tracked_extent {
            return self.extents.row_at(offset).unwrap_or(0).min(row_count - 1);
        }
        let past = offset - tracked_extent;
        let step = u64::from(self.estimate.max(1));
        let index = tracked as u64 + past / step;
        (index as usize).min(row_count - 1)
    }

    fn total_extent(&self, row_count: usize) -> u64 {
        self.offset_within(row_count, row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmeasured_rows_use_caller_default() {
        let cache = RowHeightCache::new(50);
        assert_eq!(cache.height(7, 33), 33);
    }

    #[test]
    fn first_measurement_wins() {
        let mut cache = RowHeightCache::new(50);
        assert!(cache.record_height(3, 40));
        assert!(!cache.record_height(3, 55));
        assert_eq!(cache.height(3, 10), 40);
    }

    #[test]
    fn shrink_clears_all_measurements() {
        let mut cache = RowHeightCache::new(50);
        cache.invalidate_if_shrunk(50);
        for i in 0..50 {
            cache.record_height(i, 10 + i as u32);
        }
        assert!(cache.invalidate_if_shrunk(10));
        for i in 0..50 {
            assert_eq!(cache.height(i, 77), 77);
        }
        assert_eq!(cache.previous_count(), 10);
        assert!(cache.record_height(3, 99), "cleared index accepts a new first measurement");
    }

    #[test]
    fn growth_keeps_measurements() {
        let mut cache = RowHeightCache::new(50);
        cache.invalidate_if_shrunk(10);
        cache.record_height(2, 31);
        assert!(!cache.invalidate_if_shrunk(10));
        assert!(!cache.invalidate_if_shrunk(60));
        assert_eq!(cache.height(2, 0), 31);
        assert_eq!(cache.previous_count(), 60);
    }

    #[test]
    fn offsets_mix_measured_and_estimated_rows() {
        let mut cache = RowHeightCache::new(10);
        cache.record_height(1, 30);
        // Rows: 10, 30, 10, 10 ...
        assert_eq!(cache.offset_of(0, 100), 0);
        assert_eq!(cache.offset_of(1, 100), 10);
        assert_eq!(cache.offset_of(2, 100), 40);
        assert_eq!(cache.offset_of(5, 100), 70);
        assert_eq!(cache.total_extent(4), 60);
    }

    #[test]
    fn index_at_offset_crosses_tracked_boundary() {
        let mut cache = RowHeightCache::new(10);
        cache.record_height(0, 25);
        cache.record_height(1, 5);
        // Spans: [0,25) [25,30) then 10 each: [30,40) [40,50) ...
        assert_eq!(cache.index_at_offset(0, 10), 0);
        assert_eq!(cache.index_at_offset(27, 10), 1);
        assert_eq!(cache.index_at_offset(30, 10), 2);
        assert_eq!(cache.index_at_offset(45, 10), 3);
        assert_eq!(cache.index_at_offset(10_000, 10), 9);
    }

    #[test]
    fn measured_count_tracks_records() {
        let mut cache = RowHeightCache::new(10);
        cache.record_height(0, 1);
        cache.record_height(5, 1);
        cache.record_height(5, 2);
        assert_eq!(cache.measured_count(), 2);
        cache.clear();
        assert_eq!(cache.measured_count(), 0);
        assert_eq!(cache.previous_count(), 0);
    }
}
