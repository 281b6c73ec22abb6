#![forbid(unsafe_code)]

//! Infinite-load trigger.
//!
//! [`InfiniteLoader`] watches the rendered row range and asks for the next
//! page when the range comes within `threshold` rows of the end of the loaded
//! data. It fires once per crossing into that band: while the range stays
//! inside it, repeated scroll or resize notifications do nothing. The trigger
//! re-arms when the range leaves the band, when the row count changes, or
//! through [`InfiniteLoader::rearm`] once a page lands without new rows.
//!
//! The store has its own in-flight guard; this one keeps the renderer from
//! flooding it on every frame.

use std::ops::Range;

use feedline_core::FeedConfig;

/// Result of a range notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTrigger {
    /// Nothing to do.
    None,
    /// Request the next page now.
    LoadMore,
}

/// Threshold-band detector for the next-page fetch.
#[derive(Debug, Clone)]
pub struct InfiniteLoader {
    threshold: usize,
    loaded: usize,
    has_more: bool,
    armed: bool,
}

impl InfiniteLoader {
    /// Create a loader that fires `threshold` rows before the end.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            loaded: 0,
            has_more: false,
            armed: true,
        }
    }

    /// Loader using the configured threshold.
    #[must_use]
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.load_threshold)
    }

    /// Threshold in rows.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of rows with real data.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.loaded
    }

    /// Whether more pages exist.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether row `index` has real data.
    #[must_use]
    pub fn is_index_loaded(&self, index: usize) -> bool {
        index < self.loaded
    }

    /// Rows to lay out: the loaded rows plus `placeholders` while more pages
    /// exist.
    #[must_use]
    pub fn row_count(&self, placeholders: usize) -> usize {
        if self.has_more {
            self.loaded + placeholders
        } else {
            self.loaded
        }
    }

    /// Update the loaded row count and continuation flag.
    ///
    /// A changed count re-arms the trigger (new rows were appended, or the
    /// list was replaced).
    pub fn set_loaded(&mut self, count: usize, has_more: bool) {
        if count != self.loaded {
            self.armed = true;
        }
        self.loaded = count;
        self.has_more = has_more;
    }

    /// Re-arm explicitly, e.g. after a page that added no rows or a load the
    /// store refused.
    pub fn rearm(&mut self) {
        self.armed = true;
    }

    /// Report the rendered row range; returns whether to load the next page.
    pub fn notify_rendered_range(&mut self, range: Range<usize>) -> LoadTrigger {
        if range.is_empty() || self.loaded == 0 {
            return LoadTrigger::None;
        }
        let last_rendered = range.end - 1;
        let last_loaded = self.loaded - 1;
        let in_band = last_rendered + self.threshold >= last_loaded;
        if !in_band {
            self.armed = true;
            return LoadTrigger::None;
        }
        if !self.has_more || !self.armed {
            return LoadTrigger::None;
        }
        self.armed = false;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            last_rendered,
            loaded = self.loaded,
            threshold = self.threshold,
            "load threshold crossed"
        );
        LoadTrigger::LoadMore
    }
}
