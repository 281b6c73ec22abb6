#![forbid(unsafe_code)]

//! Feedline public facade crate.
//!
//! Re-exports the types an embedding client needs from the internal crates
//! and offers a small prelude for day-to-day usage.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use feedline_core::{
    ConfigError, Cursor, DateRange, EventDecodeError, FeedConfig, FetchError, Filters, Item,
    ItemId, ItemPatch, NewArticles, Page, PageInfo, PageRequest, PushEvent, PushEventKind,
    QuerySignature, RawEvent, ReadState, RequestKind, SavedState, SseDecoder, SseItem,
};

// --- Widget re-exports -----------------------------------------------------

pub use feedline_widgets::{
    InfiniteLoader, LoadTrigger, RenderWindow, RowHeightCache, RowHeights, RowKind, RowSlot,
    WindowedRenderer,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use feedline_runtime::{
    ConnectionState, FeedSession, ListIdentity, LiveChannel, LoadOutcome, LoadPhase,
    MemoryBackend, MemoryTransport, PageSource, PaginationSnapshot, PaginationStore, PatchSink,
    PatchTicket, PushStream, PushTransport, RestoreOutcome, ScrollRestoration, SessionStore,
    StorageBackend, StorageError, Summary, SummaryCache, TransportError,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for feedline clients.
#[derive(Debug)]
pub enum Error {
    /// Invalid configuration.
    Config(ConfigError),
    /// A backend call failed.
    Fetch(FetchError),
    /// Session storage failed.
    #[cfg(feature = "runtime")]
    Storage(StorageError),
    /// The push transport failed.
    #[cfg(feature = "runtime")]
    Transport(TransportError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Fetch(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Storage(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Transport(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Fetch(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Storage(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Transport(err) => Some(err),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

#[cfg(feature = "runtime")]
impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

#[cfg(feature = "runtime")]
impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Standard result type for feedline APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, FeedConfig, Filters, Item, ItemId, ItemPatch, PushEvent, PushEventKind, ReadState,
        Result, SavedState,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{FeedSession, ListIdentity, LiveChannel, LoadPhase, ScrollRestoration};

    pub use crate::{core, widgets};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use feedline_core as core;
#[cfg(feature = "runtime")]
pub use feedline_runtime as runtime;
pub use feedline_widgets as widgets;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn errors_convert_and_keep_source() {
        let err: Error = FetchError::Status(503).into();
        assert_eq!(err.to_string(), FetchError::Status(503).to_string());
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_config_surfaces_as_error() {
        fn check(config: &FeedConfig) -> Result<()> {
            config.validate()?;
            Ok(())
        }
        assert!(check(&FeedConfig::default()).is_ok());
        assert!(matches!(
            check(&FeedConfig::default().with_page_size(0)),
            Err(Error::Config(_))
        ));
    }
}
