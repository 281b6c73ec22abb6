#![forbid(unsafe_code)]

//! Layout-side components of the feed pipeline.
//!
//! - [`RowHeightCache`] - write-once measured heights with O(log n) offsets
//! - [`WindowedRenderer`] - visible/overscan row range over a [`RowHeights`] source
//! - [`InfiniteLoader`] - once-per-crossing next-page trigger
//! - [`FenwickTree`] - prefix sums backing the height cache
//!
//! Nothing here performs I/O or owns item data; the runtime crate feeds these
//! types the loaded row count and reacts to their outputs.

pub mod fenwick;
pub mod height_cache;
pub mod infinite;
pub mod window;

pub use fenwick::FenwickTree;
pub use height_cache::RowHeightCache;
pub use infinite::{InfiniteLoader, LoadTrigger};
pub use window::{RenderWindow, RowHeights, RowKind, RowSlot, WindowedRenderer};
