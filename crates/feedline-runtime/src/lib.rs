#![forbid(unsafe_code)]

//! Feedline Runtime
//!
//! Stateful half of the feed pipeline.
//!
//! # Key Components
//!
//! - [`PaginationStore`] - loaded items, cursor, signature and loading flags
//! - [`FeedSession`] - one mounted list view; background fetches and message pump
//! - [`PageSource`] / [`PatchSink`] - backend seams, with [`MemoryBackend`]
//! - [`LiveChannel`] - server-push subscription over a [`PushTransport`]
//! - [`SummaryCache`] - per-list summaries invalidated by push events
//! - [`ScrollRestoration`] - one-shot scroll position across remounts
//! - [`SessionStore`] - session-scoped key/value storage
//!
//! # Role in feedline
//! `feedline-runtime` is the orchestrator. It owns the item list, speaks to
//! the backend on background threads, and feeds the layout components from
//! `feedline-widgets` the loaded row count. All state changes happen on the
//! thread that owns the session.

pub mod live;
pub mod restore;
pub mod session;
pub mod source;
pub mod storage;
pub mod store;
pub mod summary;

pub use live::{
    ConnectionState, FrameResult, ListenerId, LiveChannel, MemoryTransport, PushStream,
    PushTransport, StreamEnd, TransportError,
};
pub use restore::{RESTORE_KEY, RestoreOutcome, RestoreToken, ScrollRestoration, TOKEN_VERSION};
pub use session::{FeedMsg, FeedSession};
pub use source::{MemoryBackend, PageSource, PatchSink};
pub use storage::{
    MemoryStorage, SessionStore, StorageBackend, StorageError, StoredEntry,
};
pub use store::{
    InitApplied, InitKind, InitOutcome, LoadOutcome, LoadPhase, PaginationSnapshot,
    PaginationStore, PatchTicket,
};
pub use summary::{ListIdentity, ParseIdentityError, Summary, SummaryCache};
