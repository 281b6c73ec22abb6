#![forbid(unsafe_code)]

//! List identities and the list-level summary cache.
//!
//! A [`ListIdentity`] names a list the user can open (all articles, saved,
//! one feed, folder or tag). Its path form (`/articles`, `/feeds/42`, ...)
//! is what scroll restoration compares.
//!
//! [`SummaryCache`] keeps per-list unread/total counts for the navigation
//! tree. Push events mark entries stale instead of reloading anything; a
//! reader that sees a stale entry re-fetches it when convenient.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use feedline_core::{Filters, NewArticles};

/// Identity of a list view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ListIdentity {
    /// Every article.
    All,
    /// Saved / read-later articles.
    Saved,
    /// One feed.
    Feed(String),
    /// One folder.
    Folder(String),
    /// One tag.
    Tag(String),
}

impl ListIdentity {
    /// Path form, e.g. `/feeds/42`.
    #[must_use]
    pub fn to_path(&self) -> String {
        match self {
            Self::All => "/articles".to_owned(),
            Self::Saved => "/saved".to_owned(),
            Self::Feed(id) => format!("/feeds/{id}"),
            Self::Folder(id) => format!("/folders/{id}"),
            Self::Tag(id) => format!("/tags/{id}"),
        }
    }

    /// Base filters for this list.
    #[must_use]
    pub fn base_filters(&self) -> Filters {
        match self {
            Self::All => Filters::new(),
            Self::Saved => Filters::new().with_saved_state(feedline_core::SavedState::Saved),
            Self::Feed(id) => Filters::new().with_feed(id.clone()),
            Self::Folder(id) => Filters::new().with_folder(id.clone()),
            Self::Tag(id) => Filters::new().with_tag(id.clone()),
        }
    }

    /// Whether a `new_articles` event can add rows to this list.
    ///
    /// An event that names no feed, folder or tag affects every list.
    #[must_use]
    pub fn affected_by(&self, event: &NewArticles) -> bool {
        let untargeted =
            event.feed_ids.is_empty() && event.folder_ids.is_empty() && event.tag_ids.is_empty();
        match self {
            Self::All => true,
            // New arrivals are never saved yet.
            Self::Saved => false,
            Self::Feed(id) => untargeted || event.feed_ids.contains(id),
            Self::Folder(id) => untargeted || event.folder_ids.contains(id),
            Self::Tag(id) => untargeted || event.tag_ids.contains(id),
        }
    }
}

impl fmt::Display for ListIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path())
    }
}

/// Error parsing a list path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdentityError(pub String);

impl fmt::Display for ParseIdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a list path: {}", self.0)
    }
}

impl std::error::Error for ParseIdentityError {}

impl FromStr for ListIdentity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches('/');
        let parsed = match trimmed {
            "/articles" | "" => Some(Self::All),
            "/saved" => Some(Self::Saved),
            _ => {
                let mut parts = trimmed.trim_start_matches('/').splitn(2, '/');
                match (parts.next(), parts.next()) {
                    (Some("feeds"), Some(id)) if !id.is_empty() => Some(Self::Feed(id.to_owned())),
                    (Some("folders"), Some(id)) if !id.is_empty() => {
                        Some(Self::Folder(id.to_owned()))
                    }
                    (Some("tags"), Some(id)) if !id.is_empty() => Some(Self::Tag(id.to_owned())),
                    _ => None,
                }
            }
        };
        parsed.ok_or_else(|| ParseIdentityError(s.to_owned()))
    }
}

/// Counts shown next to a list in the navigation tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Unread articles.
    pub unread: u64,
    /// All articles.
    pub total: u64,
}

#[derive(Debug, Clone)]
struct SummaryEntry {
    summary: Summary,
    stale: bool,
}

/// List-level summary cache with targeted invalidation.
#[derive(Debug, Clone, Default)]
pub struct SummaryCache {
    entries: HashMap<ListIdentity, SummaryEntry>,
    generation: u64,
}

impl SummaryCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly fetched summary.
    pub fn insert(&mut self, identity: ListIdentity, summary: Summary) {
        self.entries.insert(
            identity,
            SummaryEntry {
                summary,
                stale: false,
            },
        );
    }

    /// Fresh summary for `identity`; `None` if absent or stale.
    #[must_use]
    pub fn get(&self, identity: &ListIdentity) -> Option<Summary> {
        self.entries
            .get(identity)
            .filter(|e| !e.stale)
            .map(|e| e.summary)
    }

    /// Last known summary, fresh or not.
    #[must_use]
    pub fn last_known(&self, identity: &ListIdentity) -> Option<Summary> {
        self.entries.get(identity).map(|e| e.summary)
    }

    /// Whether `identity` has an entry that needs re-fetching.
    #[must_use]
    pub fn is_stale(&self, identity: &ListIdentity) -> bool {
        self.entries.get(identity).is_some_and(|e| e.stale)
    }

    /// Identities waiting for a re-fetch.
    #[must_use]
    pub fn stale_identities(&self) -> Vec<ListIdentity> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.stale)
            .map(|(id, _)| id.clone())
            .collect();
        out.sort();
        out
    }

    /// Mark `identities` stale. Returns how many entries changed.
    pub fn invalidate(&mut self, identities: &[ListIdentity]) -> usize {
        let mut changed = 0;
        for identity in identities {
            if let Some(entry) = self.entries.get_mut(identity)
                && !entry.stale
            {
                entry.stale = true;
                changed += 1;
            }
        }
        if changed > 0 {
            self.generation += 1;
        }
        changed
    }

    /// Mark every entry stale.
    pub fn invalidate_all(&mut self) -> usize {
        let mut changed = 0;
        for entry in self.entries.values_mut().filter(|e| !e.stale) {
            entry.stale = true;
            changed += 1;
        }
        if changed > 0 {
            self.generation += 1;
        }
        changed
    }

    /// Invalidate the entries a `new_articles` event touches.
    pub fn apply_new_articles(&mut self, event: &NewArticles) -> usize {
        let affected: Vec<ListIdentity> = self
            .entries
            .keys()
            .filter(|id| id.affected_by(event))
            .cloned()
            .collect();
        let changed = self.invalidate(&affected);
        tracing::debug!(
            count = event.count,
            feeds = event.feed_ids.len(),
            invalidated = changed,
            "summaries invalidated by new articles"
        );
        changed
    }

    /// Bumped whenever an invalidation changed something.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
