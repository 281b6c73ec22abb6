#![forbid(unsafe_code)]

//! Windowed rendering over rows of heterogeneous height.
//!
//! [`WindowedRenderer`] owns the viewport (height and scroll offset in
//! pixels) and computes, for a given row count and a pull-based
//! [`RowHeights`] source, the minimal contiguous row range that covers the
//! viewport plus a fixed overscan on each side. Draw calls are the GUI
//! collaborator's business; this module only says *which* rows, *where*, and
//! whether each one has real data or needs a loading placeholder.
//!
//! # Example
//!
//! ```ignore
//! use feedline_widgets::{InfiniteLoader, RowHeightCache, WindowedRenderer};
//!
//! let heights = RowHeightCache::new(96);
//! let mut loader = InfiniteLoader::new(10);
//! loader.set_loaded(items.len(), has_more);
//!
//! let mut window = WindowedRenderer::new(800, 4);
//! let frame = window.compute(loader.row_count(3), &heights, &loader);
//! for slot in &frame.rows {
//!     // draw slot.index at slot.top, or a placeholder if !slot.is_loaded()
//! }
//! ```

use std::ops::Range;

use feedline_core::FeedConfig;

use crate::infinite::InfiniteLoader;

/// Pull-based source of row heights.
///
/// Only [`height`](Self::height) is required; the offset queries have linear
/// defaults that implementors with an index (like the row-height cache)
/// override.
pub trait RowHeights {
    /// Height of row `index` in pixels.
    fn height(&self, index: usize) -> u32;

    /// Top offset of row `index` in a list of `row_count` rows.
    fn offset_of(&self, index: usize, row_count: usize) -> u64 {
        (0..index.min(row_count))
            .map(|i| u64::from(self.height(i)))
            .sum()
    }

    /// Row covering `offset`, clamped to the last row.
    fn index_at_offset(&self, offset: u64, row_count: usize) -> usize {
        let mut top = 0u64;
        for i in 0..row_count {
            let bottom = top + u64::from(self.height(i));
            if offset < bottom {
                return i;
            }
            top = bottom;
        }
        row_count.saturating_sub(1)
    }

    /// Sum of all row heights.
    fn total_extent(&self, row_count: usize) -> u64 {
        self.offset_of(row_count, row_count)
    }
}

impl<F> RowHeights for F
where
    F: Fn(usize) -> u32,
{
    fn height(&self, index: usize) -> u32 {
        self(index)
    }
}

/// What a rendered row shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// The row has item data.
    Loaded,
    /// The row is past the loaded items; draw a loading placeholder.
    Placeholder,
}

/// One row of the computed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSlot {
    /// Row index.
    pub index: usize,
    /// Top offset within the scrollable content.
    pub top: u64,
    /// Row height.
    pub height: u32,
    /// Loaded or placeholder.
    pub kind: RowKind,
}

impl RowSlot {
    /// True when the row has data.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.kind == RowKind::Loaded
    }

    /// Top offset relative to the viewport (negative when partly above it).
    #[must_use]
    pub fn viewport_top(&self, scroll_offset: u64) -> i64 {
        self.top as i64 - scroll_offset as i64
    }
}

/// The result of one window computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderWindow {
    /// Rendered rows (visible plus overscan).
    pub range: Range<usize>,
    /// Rows intersecting the viewport proper.
    pub visible: Range<usize>,
    /// Total scrollable extent.
    pub total_extent: u64,
    /// Scroll offset used (after clamping).
    pub scroll_offset: u64,
    /// Row slots for `range`, in order.
    pub rows: Vec<RowSlot>,
}

impl RenderWindow {
    /// Number of rendered placeholder rows.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_loaded()).count()
    }
}

/// Viewport state and window computation for one list.
#[derive(Debug, Clone)]
pub struct WindowedRenderer {
    viewport_height: u32,
    scroll_offset: u64,
    overscan: usize,
    last_extent: u64,
    rendered: Range<usize>,
    pending_scroll_index: Option<usize>,
}

impl Default for WindowedRenderer {
    fn default() -> Self {
        Self::new(0, 2)
    }
}

impl WindowedRenderer {
    /// Create a renderer for a viewport `viewport_height` pixels tall.
    #[must_use]
    pub fn new(viewport_height: u32, overscan: usize) -> Self {
        Self {
            viewport_height,
            scroll_offset: 0,
            overscan,
            last_extent: 0,
            rendered: 0..0,
            pending_scroll_index: None,
        }
    }

    /// Renderer with the configured overscan.
    #[must_use]
    pub fn from_config(config: &FeedConfig, viewport_height: u32) -> Self {
        Self::new(viewport_height, config.overscan)
    }

    /// Viewport height in pixels.
    #[must_use]
    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    /// Resize the viewport.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height;
    }

    /// Current scroll offset.
    #[must_use]
    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    /// Overscan rows on each side.
    #[must_use]
    pub fn overscan(&self) -> usize {
        self.overscan
    }

    /// Set the scroll offset (clamped on the next compute).
    pub fn scroll_to(&mut self, offset: u64) {
        self.scroll_offset = offset;
        self.pending_scroll_index = None;
    }

    /// Scroll by `delta` pixels.
    pub fn scroll_by(&mut self, delta: i64) {
        let next = self.scroll_offset as i64 + delta;
        self.scroll_offset = next.max(0) as u64;
        self.pending_scroll_index = None;
    }

    /// Put row `index` at the top of the viewport on the next compute.
    ///
    /// Resolved lazily so it stays correct if heights are measured between
    /// the request and the next frame.
    pub fn scroll_to_index(&mut self, index: usize) {
        self.pending_scroll_index = Some(index);
    }

    /// Back to the top, forgetting any pending index scroll.
    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
        self.pending_scroll_index = None;
    }

    /// Row range of the last computed window.
    #[must_use]
    pub fn rendered_range(&self) -> Range<usize> {
        self.rendered.clone()
    }

    /// Largest valid scroll offset for the last computed extent.
    #[must_use]
    pub fn max_scroll_offset(&self) -> u64 {
        self.last_extent
            .saturating_sub(u64::from(self.viewport_height))
    }

    /// Compute the window for `row_count` rows.
    ///
    /// Rows at or beyond `loader`'s loaded count are marked as placeholders.
    pub fn compute(
        &mut self,
        row_count: usize,
        heights: &impl RowHeights,
        loader: &InfiniteLoader,
    ) -> RenderWindow {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "window_compute",
            rows = row_count,
            viewport = self.viewport_height,
            offset = self.scroll_offset
        )
        .entered();

        let total_extent = heights.total_extent(row_count);
        self.last_extent = total_extent;

        if let Some(index) = self.pending_scroll_index.take() {
            self.scroll_offset = heights.offset_of(index.min(row_count), row_count);
        }
        self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());

        if row_count == 0 || self.viewport_height == 0 {
            self.rendered = 0..0;
            return RenderWindow {
                range: 0..0,
                visible: 0..0,
                total_extent,
                scroll_offset: self.scroll_offset,
                rows: Vec::new(),
            };
        }

        let first = heights.index_at_offset(self.scroll_offset, row_count);
        let viewport_end = self.scroll_offset + u64::from(self.viewport_height);
        let mut top = heights.offset_of(first, row_count);
        let mut last = first;
        // Walk forward from the first visible row until the viewport is covered.
        let mut cursor = top;
        while last < row_count {
            cursor += u64::from(heights.height(last));
            last += 1;
            if cursor >= viewport_end {
                break;
            }
        }
        let visible = first..last;

        let start = first.saturating_sub(self.overscan);
        let end = (last + self.overscan).min(row_count);
        if start < first {
            top = heights.offset_of(start, row_count);
        }

        let mut rows = Vec::with_capacity(end - start);
        let mut y = top;
        for index in start..end {
            let height = heights.height(index);
            let kind = if loader.is_index_loaded(index) {
                RowKind::Loaded
            } else {
                RowKind::Placeholder
            };
            rows.push(RowSlot {
                index,
                top: y,
                height,
                kind,
            });
            y += u64::from(height);
        }

        self.rendered = start..end;
        RenderWindow {
            range: start..end,
            visible,
            total_extent,
            scroll_offset: self.scroll_offset,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height_cache::RowHeightCache;

    fn fixed(height: u32) -> impl Fn(usize) -> u32 {
        move |_| height
    }

    fn loaded(count: usize) -> InfiniteLoader {
        let mut loader = InfiniteLoader::new(5);
        loader.set_loaded(count, false);
        loader
    }

    #[test]
    fn fixed_heights_cover_viewport_plus_overscan() {
        let mut win = WindowedRenderer::new(100, 2);
        let frame = win.compute(1000, &fixed(20), &loaded(1000));
        assert_eq!(frame.visible, 0..5);
        assert_eq!(frame.range, 0..7);
        assert_eq!(frame.total_extent, 20_000);
        assert_eq!(frame.rows[3].top, 60);
    }

    #[test]
    fn scrolled_window_includes_partial_rows() {
        let mut win = WindowedRenderer::new(100, 1);
        win.scroll_to(30);
        let frame = win.compute(1000, &fixed(20), &loaded(1000));
        // Offset 30 is inside row 1; viewport ends at 130 inside row 6.
        assert_eq!(frame.visible, 1..7);
        assert_eq!(frame.range, 0..8);
        assert_eq!(frame.rows[1].viewport_top(frame.scroll_offset), -10);
    }

    #[test]
    fn heterogeneous_heights_from_cache() {
        let mut cache = RowHeightCache::new(10);
        cache.record_height(0, 200);
        let mut win = WindowedRenderer::new(100, 0);
        let frame = win.compute(50, &cache, &loaded(50));
        assert_eq!(frame.visible, 0..1);
        win.scroll_to(195);
        let frame = win.compute(50, &cache, &loaded(50));
        // Row 0 ends at 200, then 10px rows up to 295.
        assert_eq!(frame.visible, 0..11);
    }

    #[test]
    fn rows_past_loaded_count_are_placeholders() {
        let mut loader = InfiniteLoader::new(5);
        loader.set_loaded(3, true);
        let mut win = WindowedRenderer::new(100, 0);
        let frame = win.compute(loader.row_count(2), &fixed(20), &loader);
        assert_eq!(frame.range, 0..5);
        assert_eq!(frame.placeholder_count(), 2);
        assert!(frame.rows[2].is_loaded());
        assert!(!frame.rows[3].is_loaded());
    }

    #[test]
    fn scroll_offset_is_clamped_to_extent() {
        let mut win = WindowedRenderer::new(100, 0);
        win.scroll_to(1_000_000);
        let frame = win.compute(10, &fixed(20), &loaded(10));
        assert_eq!(frame.scroll_offset, 100);
        assert_eq!(frame.visible, 5..10);
        win.scroll_by(-1_000);
        assert_eq!(win.scroll_offset(), 0);
    }

    #[test]
    fn scroll_to_index_resolves_on_compute() {
        let mut win = WindowedRenderer::new(50, 0);
        win.scroll_to_index(7);
        let frame = win.compute(100, &fixed(10), &loaded(100));
        assert_eq!(frame.scroll_offset, 70);
        assert_eq!(frame.visible.start, 7);
        assert_eq!(win.rendered_range(), 7..12);
    }

    #[test]
    fn empty_list_renders_nothing() {
        let mut win = WindowedRenderer::new(100, 3);
        let frame = win.compute(0, &fixed(20), &loaded(0));
        assert!(frame.rows.is_empty());
        assert_eq!(frame.range, 0..0);
    }
}
