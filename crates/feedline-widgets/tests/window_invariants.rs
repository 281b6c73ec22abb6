#![forbid(unsafe_code)]

//! Property tests for window computation and the load trigger.
//!
//! Heights are drawn at random; the renderer must produce a contiguous,
//! correctly positioned window that covers the viewport, whether heights
//! come from a closure or from a fully measured cache.

use feedline_widgets::{
    InfiniteLoader, LoadTrigger, RowHeightCache, RowHeights, WindowedRenderer,
};
use proptest::prelude::*;

fn loaded(count: usize) -> InfiniteLoader {
    let mut loader = InfiniteLoader::new(5);
    loader.set_loaded(count, false);
    loader
}

proptest! {
    #[test]
    fn window_covers_viewport(
        heights in proptest::collection::vec(1u32..200, 1..300),
        viewport in 1u32..1000,
        offset in 0u64..60_000,
        overscan in 0usize..6,
    ) {
        let n = heights.len();
        let lookup = |i: usize| heights[i];
        let total: u64 = heights.iter().map(|&h| u64::from(h)).sum();

        let mut renderer = WindowedRenderer::new(viewport, overscan);
        renderer.scroll_to(offset);
        let frame = renderer.compute(n, &lookup, &loaded(n));

        prop_assert_eq!(frame.total_extent, total);
        prop_assert!(frame.scroll_offset <= total.saturating_sub(u64::from(viewport)));

        // Contiguous slots with prefix-sum tops.
        prop_assert_eq!(frame.rows.len(), frame.range.len());
        for (slot, index) in frame.rows.iter().zip(frame.range.clone()) {
            prop_assert_eq!(slot.index, index);
            prop_assert_eq!(slot.top, lookup.offset_of(index, n));
            prop_assert_eq!(slot.height, heights[index]);
        }

        // Overscan wraps the visible range.
        prop_assert_eq!(frame.range.start, frame.visible.start.saturating_sub(overscan));
        prop_assert_eq!(frame.range.end, (frame.visible.end + overscan).min(n));

        // First visible row contains the scroll offset; the last one starts
        // inside the viewport; together they reach its bottom.
        let first_top = lookup.offset_of(frame.visible.start, n);
        let viewport_end = frame.scroll_offset + u64::from(viewport);
        prop_assert!(first_top <= frame.scroll_offset);
        prop_assert!(frame.scroll_offset < first_top + u64::from(heights[frame.visible.start]));
        let last = frame.visible.end - 1;
        prop_assert!(lookup.offset_of(last, n) < viewport_end);
        prop_assert!(lookup.offset_of(frame.visible.end, n) >= viewport_end.min(total));
    }

    #[test]
    fn measured_cache_matches_closure(
        heights in proptest::collection::vec(1u32..200, 1..200),
        viewport in 1u32..800,
        offset in 0u64..40_000,
    ) {
        let n = heights.len();
        let lookup = |i: usize| heights[i];
        let mut cache = RowHeightCache::new(50);
        for (i, &h) in heights.iter().enumerate() {
            cache.record_height(i, h);
        }

        let mut a = WindowedRenderer::new(viewport, 2);
        let mut b = WindowedRenderer::new(viewport, 2);
        a.scroll_to(offset);
        b.scroll_to(offset);
        prop_assert_eq!(
            a.compute(n, &lookup, &loaded(n)),
            b.compute(n, &cache, &loaded(n))
        );
    }

    #[test]
    fn partial_measurement_agrees_with_estimate(
        measured in proptest::collection::vec((0usize..150, 1u32..200), 0..40),
        probe in 0usize..150,
    ) {
        let estimate = 40u32;
        let mut cache = RowHeightCache::new(estimate);
        let mut plain = vec![estimate; 150];
        for (i, h) in measured {
            if cache.record_height(i, h) {
                plain[i] = h;
            }
        }
        let lookup = |i: usize| plain[i];
        prop_assert_eq!(cache.offset_of(probe, 150), lookup.offset_of(probe, 150));
        let offset = lookup.offset_of(probe, 150);
        prop_assert_eq!(cache.index_at_offset(offset, 150), lookup.index_at_offset(offset, 150));
    }

    #[test]
    fn trigger_needs_rearm_between_fires(
        ends in proptest::collection::vec(1usize..100, 1..60),
        threshold in 0usize..10,
    ) {
        let mut loader = InfiniteLoader::new(threshold);
        loader.set_loaded(100, true);
        let mut armed_since_fire = true;
        for end in ends {
            let in_band = end - 1 + threshold >= 99;
            match loader.notify_rendered_range(end.saturating_sub(10)..end) {
                LoadTrigger::LoadMore => {
                    prop_assert!(in_band);
                    prop_assert!(armed_since_fire, "fired twice inside one band visit");
                    armed_since_fire = false;
                }
                LoadTrigger::None => {
                    if !in_band {
                        armed_since_fire = true;
                    }
                }
            }
        }
    }
}

#[test]
fn growing_list_keeps_scroll_position() {
    let mut cache = RowHeightCache::new(30);
    let mut loader = InfiniteLoader::new(3);
    let mut renderer = WindowedRenderer::new(120, 1);

    loader.set_loaded(20, true);
    cache.invalidate_if_shrunk(20);
    renderer.scroll_to(300);
    let before = renderer.compute(loader.row_count(2), &cache, &loader);

    loader.set_loaded(40, true);
    cache.invalidate_if_shrunk(40);
    let after = renderer.compute(loader.row_count(2), &cache, &loader);

    assert_eq!(before.scroll_offset, after.scroll_offset);
    assert_eq!(before.visible, after.visible);
}

#[test]
fn shrinking_list_falls_back_to_estimates() {
    let mut cache = RowHeightCache::new(30);
    cache.invalidate_if_shrunk(50);
    for i in 0..50 {
        cache.record_height(i, 100);
    }
    assert_eq!(cache.total_extent(50), 5_000);

    assert!(cache.invalidate_if_shrunk(10));
    assert_eq!(cache.total_extent(10), 300);
    assert_eq!(RowHeights::height(&cache, 3), 30);
}
