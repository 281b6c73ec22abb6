#![forbid(unsafe_code)]

//! Filter parameters and their canonical query signature.
//!
//! # Invariants
//!
//! 1. Two [`Filters`] values produce equal [`QuerySignature`]s iff they select
//!    the same server-side result set: whitespace around the search term, the
//!    order ids were added in and empty-but-present sets do not matter.
//! 2. Signatures compare by value. A signature is never cached across a filter
//!    mutation; [`Filters::signature`] recomputes it from scratch each call.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Read-state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadState {
    /// Read and unread items.
    #[default]
    All,
    /// Only unread items.
    Unread,
    /// Only read items.
    Read,
}

/// Saved / read-later filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedState {
    /// No restriction.
    #[default]
    Any,
    /// Only saved items.
    Saved,
    /// Only items queued for later.
    ReadLater,
}

/// Inclusive publication-time range in unix seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// Lower bound, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    /// Upper bound, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
}

impl DateRange {
    /// True when neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// The active filter set of a list view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    /// Free-text search term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    /// Read-state restriction.
    #[serde(default)]
    pub read_state: ReadState,
    /// Saved-state restriction.
    #[serde(default)]
    pub saved_state: SavedState,
    /// Folder ids to include.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub folder_ids: BTreeSet<String>,
    /// Feed ids to include.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub feed_ids: BTreeSet<String>,
    /// Tag ids to include.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tag_ids: BTreeSet<String>,
    /// Publication-time range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl Filters {
    /// Filters that select everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the search term.
    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    /// Set the read-state restriction.
    #[must_use]
    pub fn with_read_state(mut self, state: ReadState) -> Self {
        self.read_state = state;
        self
    }

    /// Set the saved-state restriction.
    #[must_use]
    pub fn with_saved_state(mut self, state: SavedState) -> Self {
        self.saved_state = state;
        self
    }

    /// Add a folder id.
    #[must_use]
    pub fn with_folder(mut self, id: impl Into<String>) -> Self {
        self.folder_ids.insert(id.into());
        self
    }

    /// Add a feed id.
    #[must_use]
    pub fn with_feed(mut self, id: impl Into<String>) -> Self {
        self.feed_ids.insert(id.into());
        self
    }

    /// Add a tag id.
    #[must_use]
    pub fn with_tag(mut self, id: impl Into<String>) -> Self {
        self.tag_ids.insert(id.into());
        self
    }

    /// Set the publication-time range.
    #[must_use]
    pub fn with_date_range(mut self, from: Option<i64>, to: Option<i64>) -> Self {
        self.date_range = Some(DateRange { from, to });
        self
    }

    /// Canonical form: trimmed term, empty term and unbounded range dropped.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let term = self
            .term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);
        let date_range = self.date_range.filter(|r| !r.is_unbounded());
        let strip = |ids: &BTreeSet<String>| -> BTreeSet<String> {
            ids.iter()
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect()
        };
        Self {
            term,
            read_state: self.read_state,
            saved_state: self.saved_state,
            folder_ids: strip(&self.folder_ids),
            feed_ids: strip(&self.feed_ids),
            tag_ids: strip(&self.tag_ids),
            date_range,
        }
    }

    /// Compute the canonical query signature.
    #[must_use]
    pub fn signature(&self) -> QuerySignature {
        // Field order is fixed by the struct definition and BTreeSet iterates
        // sorted, so the JSON text is canonical.
        let json = serde_json::to_string(&self.normalized()).unwrap_or_default();
        QuerySignature(json)
    }
}

/// Canonical value-equality key over all filter parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySignature(String);

impl QuerySignature {
    /// Borrow the canonical text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
