#![forbid(unsafe_code)]

//! Cursor pagination types shared by the store and the backend seam.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::item::Item;
use crate::query::{Filters, QuerySignature};

/// Opaque continuation token returned with a page.
///
/// Only meaningful together with the [`QuerySignature`] that produced it;
/// [`PageRequest`] always carries both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a backend token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pagination metadata of a page response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Whether further pages exist. `false` is authoritative.
    pub has_more: bool,
    /// Cursor for the next page, absent when there is none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
    /// Total result count, when the backend computes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// One page of items as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Items in display order.
    pub items: Vec<Item>,
    /// Continuation metadata.
    pub pagination: PageInfo,
}

impl Page {
    /// A page with more results behind `cursor`.
    #[must_use]
    pub fn with_more(items: Vec<Item>, cursor: impl Into<String>) -> Self {
        Self {
            items,
            pagination: PageInfo {
                has_more: true,
                next_cursor: Some(Cursor::new(cursor)),
                total: None,
            },
        }
    }

    /// The final page of a result set.
    #[must_use]
    pub fn last(items: Vec<Item>) -> Self {
        Self {
            items,
            pagination: PageInfo::default(),
        }
    }

    /// A continuation exists only when the backend says so and gave a cursor.
    #[must_use]
    pub fn continues(&self) -> bool {
        self.pagination.has_more && self.pagination.next_cursor.is_some()
    }
}

/// Why a page is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// First page for an empty list.
    Initial,
    /// Background re-fetch of the first page (focus, remount).
    Revalidate,
    /// Explicit user pull-to-refresh.
    Refresh,
    /// Continuation page.
    NextPage,
}

impl RequestKind {
    /// Stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Revalidate => "revalidate",
            Self::Refresh => "refresh",
            Self::NextPage => "next_page",
        }
    }
}

/// A page fetch issued by the store.
///
/// The `ticket`, `generation` and `signature` are captured when the request is
/// created; the store compares them on completion to drop stale responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Monotonic id of this request within its store.
    pub ticket: u64,
    /// Store generation at issue time (bumped by reset).
    pub generation: u64,
    /// Signature of `filters` at issue time.
    pub signature: QuerySignature,
    /// Filters to send.
    pub filters: Filters,
    /// Continuation cursor, `None` for a first page.
    pub cursor: Option<Cursor>,
    /// Page-size limit.
    pub limit: usize,
    /// Request purpose.
    pub kind: RequestKind,
    /// Zero for the first attempt, incremented by automatic retries.
    pub attempt: u32,
}

/// A failed page or mutation fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection-level failure.
    Transport(String),
    /// Backend answered with a non-success status.
    Status(u16),
    /// Response body could not be decoded.
    Decode(String),
    /// No answer within the deadline.
    Timeout(Duration),
}

impl FetchError {
    /// Whether an automatic retry is worth attempting.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::Decode(_) => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Status(code) => write!(f, "backend returned status {code}"),
            Self::Decode(msg) => write!(f, "malformed page: {msg}"),
            Self::Timeout(after) => write!(f, "timed out after {after:?}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

/// Decode a list-endpoint response body.
pub fn decode_page(body: &[u8]) -> Result<Page, FetchError> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_page_shape() {
        let body = br#"{
            "items": [{"id": "a", "is_read": false}, {"id": "b", "is_read": true}],
            "pagination": {"has_more": true, "next_cursor": "c2", "total": 40}
        }"#;
        let page = decode_page(body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.continues());
        assert_eq!(page.pagination.next_cursor, Some(Cursor::new("c2")));
        assert_eq!(page.pagination.total, Some(40));
    }

    #[test]
    fn missing_cursor_means_no_continuation() {
        let body = br#"{"items": [], "pagination": {"has_more": true}}"#;
        let page = decode_page(body).unwrap();
        assert!(!page.continues());
    }

    #[test]
    fn malformed_page_is_decode_error() {
        let err = decode_page(b"{\"items\": 3}").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_classification() {
        assert!(FetchError::Transport("reset".into()).is_transient());
        assert!(FetchError::Status(503).is_transient());
        assert!(FetchError::Status(429).is_transient());
        assert!(!FetchError::Status(404).is_transient());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_transient());
    }
}
