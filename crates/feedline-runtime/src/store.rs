#![forbid(unsafe_code)]

//! Pagination store.
//!
//! [`PaginationStore`] owns the loaded item list of one list view together
//! with its continuation cursor, the signature it was loaded under, and the
//! loading flags. It never performs I/O: every fetch is described by a
//! [`PageRequest`] the store hands out, and the caller reports the result
//! back through [`complete_initial`](PaginationStore::complete_initial) or
//! [`complete_load_more`](PaginationStore::complete_load_more).
//!
//! # State machine
//!
//! ```text
//!   Idle ──begin_initial──▶ Initializing ──page──▶ Ready
//!   Ready ──load_more──▶ LoadingMore ──page──▶ Ready
//!   LoadingMore ──fail, fail──▶ Retryable ──retry──▶ LoadingMore
//!   Ready ──begin_refresh──▶ Refreshing ──page──▶ Ready
//! ```
//!
//! # Invariants
//!
//! 1. Item ids are unique; insertion order is display order.
//! 2. At most one next-page request is in flight. `load_more` is rejected
//!    while loading, while a retry is pending, and until the list is
//!    initialized under the active signature.
//! 3. A response is applied only if its ticket is the one the store is
//!    waiting for, its generation matches (bumped by [`reset`]), and its
//!    signature still matches the active filters. Anything else is stale
//!    and dropped without touching state.
//! 4. A cursor is never sent with filters other than the ones that produced
//!    it.
//! 5. Optimistic patches change only the patched item's flags; cursor,
//!    `has_more` and signature are untouched.
//!
//! [`reset`]: PaginationStore::reset

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use feedline_core::{
    Cursor, FeedConfig, FetchError, Filters, Item, ItemId, ItemPatch, Page, PageRequest,
    QuerySignature, RequestKind,
};

/// How a freshly fetched first page should be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    /// Background re-fetch (focus, remount). Keeps the loaded list when the
    /// signature is unchanged.
    Revalidate,
    /// Explicit pull-to-refresh. Always replaces.
    Refresh,
}

impl InitKind {
    /// Merge rule for a first-page request kind; `None` for continuation pages.
    #[must_use]
    pub fn for_request(kind: RequestKind) -> Option<Self> {
        match kind {
            RequestKind::Initial | RequestKind::Revalidate => Some(Self::Revalidate),
            RequestKind::Refresh => Some(Self::Refresh),
            RequestKind::NextPage => None,
        }
    }
}

/// What [`PaginationStore::initialize_with_page`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitApplied {
    /// Items, cursor, signature and flags were replaced.
    Replaced,
    /// Same signature, list kept; only `has_more` was updated.
    HasMoreOnly,
}

/// Result of completing a first-page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The page was merged.
    Applied(InitApplied),
    /// The fetch failed; the loaded list is untouched.
    Failed(FetchError),
    /// The response belongs to a superseded request and was ignored.
    Stale,
}

/// Result of completing a next-page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Items were appended.
    Appended {
        /// Number of new items (duplicates are skipped).
        added: usize,
        /// Whether further pages exist.
        has_more: bool,
    },
    /// First failure: re-issue `request` after `after`. The load stays in
    /// flight until then.
    RetryScheduled {
        /// Backoff before the retry.
        after: Duration,
        /// The request to re-issue via [`PaginationStore::retry_request`].
        request: PageRequest,
    },
    /// Second consecutive failure: `can_retry` is set and no further
    /// automatic attempt will be made.
    RetryExhausted(FetchError),
    /// The response belongs to a superseded request and was ignored.
    Stale,
}

/// Handle of a pending optimistic patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchTicket(u64);

impl PatchTicket {
    /// Raw ticket number.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PatchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patch#{}", self.0)
    }
}

/// Loading phase derived from the store flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Nothing loaded, nothing in flight.
    Idle,
    /// First page for an empty (or re-filtered) list in flight.
    Initializing,
    /// Loaded and quiescent.
    Ready,
    /// Next page in flight (including a scheduled automatic retry).
    LoadingMore,
    /// Automatic retries exhausted; waiting for a manual retry.
    Retryable,
    /// Explicit refresh in flight.
    Refreshing,
}

impl LoadPhase {
    /// Whether any fetch is outstanding.
    #[must_use]
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::LoadingMore | Self::Refreshing
        )
    }

    /// Stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::LoadingMore => "loading_more",
            Self::Retryable => "retryable",
            Self::Refreshing => "refreshing",
        }
    }
}

/// Read-only copy of the store state, without the items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationSnapshot {
    /// Number of loaded items.
    pub item_count: usize,
    /// Continuation cursor.
    pub cursor: Option<Cursor>,
    /// Signature the loaded list belongs to.
    pub query_signature: Option<QuerySignature>,
    /// Whether further pages exist.
    pub has_more: bool,
    /// First page in flight for an empty or re-filtered list.
    pub is_initializing: bool,
    /// Next page in flight.
    pub is_loading_more: bool,
    /// Explicit refresh in flight.
    pub is_refreshing: bool,
    /// Manual retry available.
    pub can_retry: bool,
    /// Unreconciled optimistic patches.
    pub pending_patches: usize,
}

impl PaginationSnapshot {
    /// Loading phase for these flags.
    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        if self.is_initializing {
            LoadPhase::Initializing
        } else if self.is_refreshing {
            LoadPhase::Refreshing
        } else if self.is_loading_more {
            LoadPhase::LoadingMore
        } else if self.can_retry {
            LoadPhase::Retryable
        } else if self.query_signature.is_some() {
            LoadPhase::Ready
        } else {
            LoadPhase::Idle
        }
    }
}

#[derive(Debug, Clone)]
struct PendingPatch {
    ticket: PatchTicket,
    id: ItemId,
    patch: ItemPatch,
    /// Values to restore on rollback. Fields owned by a later pending patch
    /// or overwritten by a confirmed one are absent.
    inverse: ItemPatch,
}

/// Loaded items and loading state of one list view.
#[derive(Debug, Clone)]
pub struct PaginationStore {
    items: Vec<Item>,
    positions: HashMap<ItemId, usize>,
    cursor: Option<Cursor>,
    filters: Filters,
    active_signature: QuerySignature,
    loaded_signature: Option<QuerySignature>,
    has_more: bool,
    is_initializing: bool,
    is_loading_more: bool,
    is_refreshing: bool,
    can_retry: bool,
    first_page_ticket: Option<u64>,
    next_page_ticket: Option<u64>,
    last_ticket: u64,
    last_patch: u64,
    generation: u64,
    pending: Vec<PendingPatch>,
    page_size: usize,
    retry_backoff: Duration,
    retry_transient_only: bool,
}

impl Default for PaginationStore {
    fn default() -> Self {
        Self::new(&FeedConfig::default())
    }
}

impl PaginationStore {
    /// Create an empty store using the page size and retry backoff of `config`.
    #[must_use]
    pub fn new(config: &FeedConfig) -> Self {
        let filters = Filters::default();
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
            cursor: None,
            active_signature: filters.signature(),
            filters,
            loaded_signature: None,
            has_more: false,
            is_initializing: false,
            is_loading_more: false,
            is_refreshing: false,
            can_retry: false,
            first_page_ticket: None,
            next_page_ticket: None,
            last_ticket: 0,
            last_patch: 0,
            generation: 0,
            pending: Vec::new(),
            page_size: config.page_size,
            retry_backoff: config.retry_backoff,
            retry_transient_only: config.retry_transient_only,
        }
    }

    // ── Filters ──────────────────────────────────────────────────────────

    /// Replace the active filters and recompute the signature.
    ///
    /// Returns whether the signature changed. Loaded state is left alone; the
    /// next first page decides whether it is replaced.
    pub fn set_filters(&mut self, filters: Filters) -> bool {
        let signature = filters.signature();
        let changed = signature != self.active_signature;
        if changed {
            tracing::debug!(
                from = %self.active_signature,
                to = %signature,
                "query signature changed"
            );
        }
        self.filters = filters;
        self.active_signature = signature;
        changed
    }

    // ── First page ───────────────────────────────────────────────────────

    /// Request the first page for the active filters.
    ///
    /// Kind is [`RequestKind::Revalidate`] when items for the active
    /// signature are already loaded, otherwise [`RequestKind::Initial`] (and
    /// the store enters `Initializing`). Supersedes any first-page request
    /// still in flight.
    pub fn begin_initial(&mut self) -> PageRequest {
        let kind = if self.has_current_items() {
            RequestKind::Revalidate
        } else {
            self.is_initializing = true;
            RequestKind::Initial
        };
        self.begin_first_page(kind)
    }

    /// Request the first page as an explicit refresh.
    pub fn begin_refresh(&mut self) -> PageRequest {
        self.is_refreshing = true;
        self.begin_first_page(RequestKind::Refresh)
    }

    /// Report the result of a first-page request.
    ///
    /// A response for filters that have since changed is stale. When no newer
    /// first page was requested, it also ends `Initializing`/`Refreshing`; the
    /// caller issues the first page for the new filters.
    pub fn complete_initial(
        &mut self,
        request: &PageRequest,
        result: Result<Page, FetchError>,
    ) -> InitOutcome {
        let awaited =
            request.generation == self.generation && self.first_page_ticket == Some(request.ticket);
        if awaited && request.signature != self.active_signature {
            self.first_page_ticket = None;
            self.is_initializing = false;
            self.is_refreshing = false;
        }
        if !awaited || request.signature != self.active_signature {
            tracing::debug!(
                ticket = request.ticket,
                kind = request.kind.as_str(),
                "dropping stale first page"
            );
            return InitOutcome::Stale;
        }
        self.first_page_ticket = None;
        match result {
            Ok(page) => {
                let kind = InitKind::for_request(request.kind).unwrap_or(InitKind::Revalidate);
                InitOutcome::Applied(self.initialize_with_page(page, kind))
            }
            Err(error) => {
                self.is_initializing = false;
                self.is_refreshing = false;
                tracing::warn!(
                    ticket = request.ticket,
                    kind = request.kind.as_str(),
                    %error,
                    "first page fetch failed"
                );
                InitOutcome::Failed(error)
            }
        }
    }

    /// Merge a first page fetched under the active signature.
    ///
    /// When the signature is unchanged, the store already has items, and
    /// `kind` is [`InitKind::Revalidate`], only `has_more` is updated so the
    /// rendered rows and scroll position survive. Otherwise items, cursor,
    /// signature and flags are replaced wholesale. Duplicate ids within the
    /// page keep their first occurrence.
    pub fn initialize_with_page(&mut self, page: Page, kind: InitKind) -> InitApplied {
        let has_more = page.continues();
        self.is_initializing = false;
        self.is_refreshing = false;

        if kind == InitKind::Revalidate && self.has_current_items() {
            // A list that already reached its end has no cursor to continue from.
            self.has_more = has_more && self.cursor.is_some();
            tracing::debug!(
                has_more = self.has_more,
                items = self.items.len(),
                "revalidated first page"
            );
            return InitApplied::HasMoreOnly;
        }

        let Page { items, pagination } = page;
        self.replace_items(items);
        self.cursor = if has_more { pagination.next_cursor } else { None };
        self.has_more = has_more;
        self.loaded_signature = Some(self.active_signature.clone());
        self.is_loading_more = false;
        self.next_page_ticket = None;
        self.can_retry = false;
        self.reapply_pending();
        tracing::debug!(
            items = self.items.len(),
            has_more,
            kind = ?kind,
            "list replaced"
        );
        InitApplied::Replaced
    }

    // ── Next page ────────────────────────────────────────────────────────

    /// Request the next page, if allowed.
    ///
    /// Returns `None` when there is no cursor, no further pages, the list is
    /// not initialized under the active filters, a load is in flight, or a
    /// manual retry is pending.
    pub fn load_more(&mut self) -> Option<PageRequest> {
        let blocked = if self.cursor.is_none() {
            Some("no cursor")
        } else if !self.has_more {
            Some("no more pages")
        } else if self.is_initializing
            || self.loaded_signature.as_ref() != Some(&self.active_signature)
        {
            Some("not initialized")
        } else if self.is_loading_more {
            Some("load in flight")
        } else if self.can_retry {
            Some("retry pending")
        } else {
            None
        };
        if let Some(reason) = blocked {
            tracing::trace!(reason, "load_more ignored");
            return None;
        }

        let request = self.issue(RequestKind::NextPage, self.cursor.clone());
        self.is_loading_more = true;
        self.next_page_ticket = Some(request.ticket);
        tracing::debug!(ticket = request.ticket, items = self.items.len(), "load_more issued");
        Some(request)
    }

    /// Report the result of a next-page request.
    pub fn complete_load_more(
        &mut self,
        request: &PageRequest,
        result: Result<Page, FetchError>,
    ) -> LoadOutcome {
        if request.generation != self.generation || self.next_page_ticket != Some(request.ticket)
        {
            tracing::debug!(ticket = request.ticket, "dropping stale next page");
            return LoadOutcome::Stale;
        }
        if self.loaded_signature.as_ref() != Some(&request.signature)
            || request.signature != self.active_signature
        {
            // Filters moved under the request; its cursor is meaningless now.
            self.next_page_ticket = None;
            self.is_loading_more = false;
            tracing::debug!(ticket = request.ticket, "dropping next page for old signature");
            return LoadOutcome::Stale;
        }

        match result {
            Ok(page) => {
                let has_more = page.continues();
                let Page { items, pagination } = page;
                let offered = items.len();
                let mut added = 0;
                for item in items {
                    if self.push_unique(item) {
                        added += 1;
                    }
                }
                self.cursor = if has_more { pagination.next_cursor } else { None };
                self.has_more = has_more;
                self.is_loading_more = false;
                self.next_page_ticket = None;
                self.can_retry = false;
                tracing::debug!(
                    ticket = request.ticket,
                    added,
                    skipped = offered - added,
                    has_more,
                    "page appended"
                );
                LoadOutcome::Appended { added, has_more }
            }
            Err(error) => {
                let retryable = !self.retry_transient_only || error.is_transient();
                if request.attempt == 0 && retryable {
                    let mut retry = request.clone();
                    retry.attempt += 1;
                    tracing::info!(
                        ticket = request.ticket,
                        %error,
                        backoff_ms = self.retry_backoff.as_millis() as u64,
                        "next page failed, retrying once"
                    );
                    LoadOutcome::RetryScheduled {
                        after: self.retry_backoff,
                        request: retry,
                    }
                } else {
                    self.is_loading_more = false;
                    self.next_page_ticket = None;
                    self.can_retry = true;
                    tracing::warn!(
                        ticket = request.ticket,
                        attempt = request.attempt,
                        %error,
                        "next page failed, manual retry required"
                    );
                    LoadOutcome::RetryExhausted(error)
                }
            }
        }
    }

    /// Confirm that a scheduled automatic retry should still be sent.
    ///
    /// Returns the request to fetch, or `None` if it was superseded while the
    /// backoff elapsed.
    pub fn retry_request(&mut self, request: &PageRequest) -> Option<PageRequest> {
        let live = self.is_loading_more
            && request.generation == self.generation
            && self.next_page_ticket == Some(request.ticket)
            && request.signature == self.active_signature;
        if !live {
            tracing::debug!(ticket = request.ticket, "scheduled retry superseded");
            return None;
        }
        Some(request.clone())
    }

    /// The user-facing retry after automatic retries were exhausted.
    ///
    /// Only valid while `can_retry`; starts a fresh attempt budget.
    pub fn retry(&mut self) -> Option<PageRequest> {
        if !self.can_retry {
            return None;
        }
        self.can_retry = false;
        tracing::debug!("manual retry");
        self.load_more()
    }

    // ── Optimistic patches ───────────────────────────────────────────────

    /// Apply `patch` to item `id` locally and record it as pending.
    ///
    /// Returns `None` (and changes nothing) if the id is not loaded or the
    /// patch is empty.
    pub fn patch_item(&mut self, id: &str, patch: ItemPatch) -> Option<PatchTicket> {
        if patch.is_empty() {
            return None;
        }
        let &pos = self.positions.get(id)?;
        let item = &mut self.items[pos];
        let inverse = item.apply(&patch);
        self.last_patch += 1;
        let ticket = PatchTicket(self.last_patch);
        self.pending.push(PendingPatch {
            ticket,
            id: item.id.clone(),
            patch,
            inverse,
        });
        tracing::debug!(%ticket, id, ?patch, "optimistic patch applied");
        Some(ticket)
    }

    /// The server accepted the patch; keep its values.
    ///
    /// Returns `false` for unknown tickets (already settled, or dropped
    /// because the item left the list).
    pub fn confirm_patch(&mut self, ticket: PatchTicket) -> bool {
        let Some(index) = self.pending.iter().position(|p| p.ticket == ticket) else {
            return false;
        };
        let done = self.pending.remove(index);
        // An earlier patch rolled back later must not undo accepted fields.
        for earlier in self.pending[..index]
            .iter_mut()
            .filter(|p| p.id == done.id)
        {
            earlier.inverse = earlier.inverse.without(&done.patch);
        }
        tracing::debug!(%ticket, id = %done.id, "patch confirmed");
        true
    }

    /// The server rejected the patch; restore the previous values.
    ///
    /// Fields a later pending patch on the same item also set stay as they
    /// are; the previous values move into that patch's inverse instead.
    pub fn rollback_patch(&mut self, ticket: PatchTicket) -> bool {
        let Some(index) = self.pending.iter().position(|p| p.ticket == ticket) else {
            return false;
        };
        let undone = self.pending.remove(index);
        let mut restore = undone.inverse;
        for later in self.pending[index..]
            .iter_mut()
            .filter(|p| p.id == undone.id)
        {
            let shared = restore.only(&later.patch);
            later.inverse = later.inverse.overlay(&shared);
            restore = restore.without(&later.patch);
        }
        if !restore.is_empty()
            && let Some(&pos) = self.positions.get(undone.id.as_str())
        {
            self.items[pos].apply(&restore);
        }
        tracing::debug!(%ticket, id = %undone.id, "patch rolled back");
        true
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Clear items, cursor, filters, signature, flags and pending patches.
    ///
    /// Bumps the generation so every outstanding response becomes stale.
    pub fn reset(&mut self) {
        self.items.clear();
        self.positions.clear();
        self.cursor = None;
        self.filters = Filters::default();
        self.active_signature = self.filters.signature();
        self.loaded_signature = None;
        self.has_more = false;
        self.is_initializing = false;
        self.is_loading_more = false;
        self.is_refreshing = false;
        self.can_retry = false;
        self.first_page_ticket = None;
        self.next_page_ticket = None;
        self.pending.clear();
        self.generation += 1;
        tracing::debug!(generation = self.generation, "store reset");
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Loaded items in display order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of loaded items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.positions.get(id).map(|&pos| &self.items[pos])
    }

    /// Display index of item `id`.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Continuation cursor.
    #[must_use]
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Active filters.
    #[must_use]
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Signature of the active filters.
    #[must_use]
    pub fn active_signature(&self) -> &QuerySignature {
        &self.active_signature
    }

    /// Signature the loaded list belongs to.
    #[must_use]
    pub fn query_signature(&self) -> Option<&QuerySignature> {
        self.loaded_signature.as_ref()
    }

    /// Whether further pages exist.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// First page in flight for an empty or re-filtered list.
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.is_initializing
    }

    /// Next page in flight.
    #[must_use]
    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    /// Explicit refresh in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }

    /// Manual retry available.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.can_retry
    }

    /// Reset counter stamped on every request.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of unreconciled patches.
    #[must_use]
    pub fn pending_patches(&self) -> usize {
        self.pending.len()
    }

    /// Loading phase.
    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        self.snapshot().phase()
    }

    /// Copy of the state flags.
    #[must_use]
    pub fn snapshot(&self) -> PaginationSnapshot {
        PaginationSnapshot {
            item_count: self.items.len(),
            cursor: self.cursor.clone(),
            query_signature: self.loaded_signature.clone(),
            has_more: self.has_more,
            is_initializing: self.is_initializing,
            is_loading_more: self.is_loading_more,
            is_refreshing: self.is_refreshing,
            can_retry: self.can_retry,
            pending_patches: self.pending.len(),
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn has_current_items(&self) -> bool {
        !self.items.is_empty() && self.loaded_signature.as_ref() == Some(&self.active_signature)
    }

    fn begin_first_page(&mut self, kind: RequestKind) -> PageRequest {
        let request = self.issue(kind, None);
        if let Some(previous) = self.first_page_ticket.replace(request.ticket) {
            tracing::trace!(previous, ticket = request.ticket, "first page superseded");
        }
        tracing::debug!(ticket = request.ticket, kind = kind.as_str(), "first page issued");
        request
    }

    fn issue(&mut self, kind: RequestKind, cursor: Option<Cursor>) -> PageRequest {
        self.last_ticket += 1;
        PageRequest {
            ticket: self.last_ticket,
            generation: self.generation,
            signature: self.active_signature.clone(),
            filters: self.filters.clone(),
            cursor,
            limit: self.page_size,
            kind,
            attempt: 0,
        }
    }

    fn replace_items(&mut self, items: Vec<Item>) {
        self.items.clear();
        self.positions.clear();
        let offered = items.len();
        for item in items {
            self.push_unique(item);
        }
        if self.items.len() < offered {
            tracing::debug!(
                dropped = offered - self.items.len(),
                "duplicate ids in first page"
            );
        }
    }

    fn push_unique(&mut self, item: Item) -> bool {
        if self.positions.contains_key(&item.id) {
            return false;
        }
        self.positions.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        true
    }

    /// Re-apply pending patches to a replaced list so unreconciled changes
    /// do not flicker back. Patches whose item is gone are dropped.
    fn reapply_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for mut record in pending {
            match self.positions.get(record.id.as_str()) {
                Some(&pos) => {
                    record.inverse = self.items[pos].apply(&record.patch);
                    self.pending.push(record);
                }
                None => {
                    tracing::debug!(ticket = %record.ticket, id = %record.id, "pending patch dropped");
                }
            }
        }
    }
}
