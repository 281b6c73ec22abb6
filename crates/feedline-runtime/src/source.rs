#![forbid(unsafe_code)]

//! Backend seams: the paginated list endpoint and the item mutation endpoint.
//!
//! Both traits are blocking and are only ever called from background task
//! threads, never from the thread that owns the store.
//!
//! [`MemoryBackend`] is an in-process implementation of both, with filter
//! evaluation, offset cursors, scripted failures and optional latency. It
//! backs the harness and the integration tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use feedline_core::{
    Cursor, FetchError, Filters, Item, ItemId, ItemPatch, Page, PageInfo, PageRequest, ReadState,
    SavedState,
};

/// The paginated list endpoint.
pub trait PageSource: Send + Sync {
    /// Fetch one page for `request`.
    fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError>;
}

impl<F> PageSource for F
where
    F: Fn(&PageRequest) -> Result<Page, FetchError> + Send + Sync,
{
    fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError> {
        self(request)
    }
}

/// The single-item mutation endpoint used to reconcile optimistic patches.
pub trait PatchSink: Send + Sync {
    /// Persist `patch` for item `id`.
    fn apply_patch(&self, id: &ItemId, patch: &ItemPatch) -> Result<(), FetchError>;
}

#[derive(Debug, Default)]
struct BackendState {
    items: Vec<Item>,
    page_failures: VecDeque<FetchError>,
    patch_failures: VecDeque<FetchError>,
    latency: Duration,
}

/// In-memory list and mutation backend.
///
/// Cursors are decimal offsets prefixed with the request signature, so a
/// cursor presented with different filters is rejected with
/// [`FetchError::Status`]`(400)`.
pub struct MemoryBackend {
    state: Mutex<BackendState>,
    page_calls: AtomicUsize,
    patch_calls: AtomicUsize,
}

impl MemoryBackend {
    /// Backend serving `items` in order.
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            state: Mutex::new(BackendState {
                items,
                ..BackendState::default()
            }),
            page_calls: AtomicUsize::new(0),
            patch_calls: AtomicUsize::new(0),
        }
    }

    /// Backend with `count` generated items `item-0000 ..`, every third one
    /// already read, every fifth saved, spread over four feeds.
    #[must_use]
    pub fn generated(count: usize) -> Self {
        let items = (0..count)
            .map(|i| {
                Item::new(format!("item-{i:04}"))
                    .with_read(i % 3 == 0)
                    .with_saved(i % 5 == 0)
                    .with_field("title", format!("Article {i}"))
                    .with_field("feed_id", format!("feed-{}", i % 4))
            })
            .collect();
        Self::new(items)
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Fail the next page fetches with `errors`, in order.
    pub fn fail_pages(&self, errors: impl IntoIterator<Item = FetchError>) {
        self.lock().page_failures.extend(errors);
    }

    /// Fail the next patch calls with `errors`, in order.
    pub fn fail_patches(&self, errors: impl IntoIterator<Item = FetchError>) {
        self.lock().patch_failures.extend(errors);
    }

    /// Insert `item` at the head of the list (a newly ingested article).
    pub fn prepend(&self, item: Item) {
        self.lock().items.insert(0, item);
    }

    /// Remove every item matching `predicate`.
    pub fn remove_where(&self, predicate: impl Fn(&Item) -> bool) {
        self.lock().items.retain(|item| !predicate(item));
    }

    /// Server-side copy of item `id`.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<Item> {
        self.lock().items.iter().find(|i| i.id.as_str() == id).cloned()
    }

    /// Number of `fetch_page` calls so far.
    #[must_use]
    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Number of `apply_patch` calls so far.
    #[must_use]
    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep_latency(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryBackend")
            .field("items", &state.items.len())
            .field("page_calls", &self.page_calls())
            .field("patch_calls", &self.patch_calls())
            .finish()
    }
}

impl PageSource for MemoryBackend {
    fn fetch_page(&self, request: &PageRequest) -> Result<Page, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.sleep_latency();
        let mut state = self.lock();
        if let Some(error) = state.page_failures.pop_front() {
            return Err(error);
        }

        let offset = match &request.cursor {
            None => 0,
            Some(cursor) => decode_cursor(cursor, request.signature.as_str())?,
        };
        let matching: Vec<&Item> = state
            .items
            .iter()
            .filter(|item| matches_filters(item, &request.filters))
            .collect();
        let limit = request.limit.max(1);
        let end = (offset + limit).min(matching.len());
        let items = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|item| (*item).clone())
            .collect();
        let has_more = end < matching.len();
        Ok(Page {
            items,
            pagination: PageInfo {
                has_more,
                next_cursor: has_more
                    .then(|| Cursor::new(format!("{}#{end}", request.signature))),
                total: Some(matching.len() as u64),
            },
        })
    }
}

impl PatchSink for MemoryBackend {
    fn apply_patch(&self, id: &ItemId, patch: &ItemPatch) -> Result<(), FetchError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        self.sleep_latency();
        let mut state = self.lock();
        if let Some(error) = state.patch_failures.pop_front() {
            return Err(error);
        }
        let item = state
            .items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or(FetchError::Status(404))?;
        item.apply(patch);
        Ok(())
    }
}

fn decode_cursor(cursor: &Cursor, signature: &str) -> Result<usize, FetchError> {
    let (issued_for, offset) = cursor
        .as_str()
        .rsplit_once('#')
        .ok_or(FetchError::Status(400))?;
    if issued_for != signature {
        return Err(FetchError::Status(400));
    }
    offset.parse().map_err(|_| FetchError::Status(400))
}

/// Server-side filter evaluation for the in-memory backend.
///
/// The term matches the `title` payload field case-insensitively; feed ids
/// match the `feed_id` field. Folder and tag ids match `folder_id` and
/// `tags` when present. Dates compare against a numeric `published` field.
fn matches_filters(item: &Item, filters: &Filters) -> bool {
    let field = |name: &str| item.payload.get(name);
    let text = |name: &str| field(name).and_then(|v| v.as_str()).unwrap_or_default();

    let read_ok = match filters.read_state {
        ReadState::All => true,
        ReadState::Unread => !item.is_read,
        ReadState::Read => item.is_read,
    };
    let saved_ok = match filters.saved_state {
        SavedState::Any => true,
        SavedState::Saved | SavedState::ReadLater => item.is_saved,
    };
    let term_ok = filters
        .term
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .is_none_or(|t| text("title").to_lowercase().contains(&t.to_lowercase()));
    let feed_ok = filters.feed_ids.is_empty() || filters.feed_ids.contains(text("feed_id"));
    let folder_ok = filters.folder_ids.is_empty() || filters.folder_ids.contains(text("folder_id"));
    let tag_ok = filters.tag_ids.is_empty()
        || field("tags")
            .and_then(|v| v.as_array())
            .is_some_and(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str())
                    .any(|t| filters.tag_ids.contains(t))
            });
    let date_ok = filters.date_range.is_none_or(|range| {
        let published = field("published").and_then(|v| v.as_i64());
        match published {
            None => range.is_unbounded(),
            Some(at) => range.from.is_none_or(|from| at >= from) && range.to.is_none_or(|to| at <= to),
        }
    });

    read_ok && saved_ok && term_ok && feed_ok && folder_ok && tag_ok && date_ok
}
