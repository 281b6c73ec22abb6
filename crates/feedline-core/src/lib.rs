#![forbid(unsafe_code)]

//! Core data model for the feedline pipeline.
//!
//! # Role in feedline
//! `feedline-core` holds the vocabulary every other crate speaks: items and
//! their optimistic patches, filters and their canonical query signature,
//! cursor pages, the push-event enumeration and its wire decoder, and the
//! pipeline configuration. It performs no I/O.

pub mod config;
pub mod event;
pub mod item;
pub mod page;
pub mod query;
pub mod sse;

pub use config::{ConfigError, FeedConfig};
pub use event::{
    BackfillFailure, DiscoveryOutcome, EventDecodeError, ExportComplete, ImportComplete,
    ImportProgress, NewArticles, PushEvent, PushEventKind, RawEvent,
};
pub use item::{Item, ItemId, ItemPatch};
pub use page::{Cursor, FetchError, Page, PageInfo, PageRequest, RequestKind, decode_page};
pub use query::{DateRange, Filters, QuerySignature, ReadState, SavedState};
pub use sse::{MAX_LINE_LEN, SseDecoder, SseItem};
