#![forbid(unsafe_code)]

//! Feed session: one mounted list view.
//!
//! [`FeedSession`] ties a [`PaginationStore`] to the layout components
//! (row-height cache, windowed renderer, infinite loader) and to scroll
//! restoration. It is the only owner of that state.
//!
//! I/O follows the background-task model: every page fetch, retry backoff
//! and patch call runs on its own thread and posts a [`FeedMsg`] back over
//! an mpsc channel. The owner applies them in [`pump`](FeedSession::pump)
//! (non-blocking) or [`pump_until_idle`](FeedSession::pump_until_idle).
//! Nothing mutates session state off the owning thread.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(MemoryBackend::generated(200));
//! let mut session = FeedSession::new(FeedConfig::default(), backend.clone())
//!     .with_patch_sink(backend)
//!     .with_viewport(800);
//!
//! session.mount(ListIdentity::All, Filters::new());
//! session.pump_until_idle(Duration::from_secs(1));
//!
//! // each UI frame:
//! session.pump();
//! let window = session.frame();
//! ```

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use feedline_core::{
    FeedConfig, FetchError, Filters, Item, ItemId, ItemPatch, NewArticles, Page, PageRequest,
    RequestKind,
};
use feedline_widgets::{
    InfiniteLoader, LoadTrigger, RenderWindow, RowHeightCache, RowHeights, WindowedRenderer,
};

use crate::restore::{RestoreOutcome, ScrollRestoration};
use crate::source::{PageSource, PatchSink};
use crate::store::{
    InitApplied, InitOutcome, LoadOutcome, LoadPhase, PaginationSnapshot, PaginationStore,
    PatchTicket,
};
use crate::summary::ListIdentity;

/// Viewport height used until the host reports one.
const DEFAULT_VIEWPORT: u32 = 600;

/// Messages posted by background tasks.
#[derive(Debug)]
pub enum FeedMsg {
    /// A page fetch finished.
    PageLoaded {
        /// The request as issued.
        request: PageRequest,
        /// Backend result.
        result: Result<Page, FetchError>,
    },
    /// The backoff for an automatic retry elapsed.
    RetryDue(PageRequest),
    /// The mutation endpoint answered for an optimistic patch.
    PatchSettled {
        /// Patch being reconciled.
        ticket: PatchTicket,
        /// Backend result.
        result: Result<(), FetchError>,
    },
}

/// Driver for one list view.
pub struct FeedSession {
    config: FeedConfig,
    source: Arc<dyn PageSource>,
    sink: Option<Arc<dyn PatchSink>>,
    store: PaginationStore,
    heights: RowHeightCache,
    loader: InfiniteLoader,
    renderer: WindowedRenderer,
    restoration: Option<ScrollRestoration>,
    identity: Option<ListIdentity>,
    sender: mpsc::Sender<FeedMsg>,
    receiver: mpsc::Receiver<FeedMsg>,
    task_handles: Vec<thread::JoinHandle<()>>,
    in_flight: usize,
    new_items_available: bool,
    last_error: Option<FetchError>,
    restore_pending: bool,
}

impl FeedSession {
    /// Unmounted session reading pages from `source`.
    pub fn new(config: FeedConfig, source: Arc<dyn PageSource>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            store: PaginationStore::new(&config),
            heights: RowHeightCache::from_config(&config),
            loader: InfiniteLoader::from_config(&config),
            renderer: WindowedRenderer::from_config(&config, DEFAULT_VIEWPORT),
            config,
            source,
            sink: None,
            restoration: None,
            identity: None,
            sender,
            receiver,
            task_handles: Vec::new(),
            in_flight: 0,
            new_items_available: false,
            last_error: None,
            restore_pending: false,
        }
    }

    /// Reconcile optimistic patches through `sink`.
    ///
    /// Without a sink, callers settle patches themselves via
    /// [`confirm_patch`](Self::confirm_patch) / [`rollback_patch`](Self::rollback_patch).
    #[must_use]
    pub fn with_patch_sink(mut self, sink: Arc<dyn PatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Save and restore the scroll position through `restoration`.
    #[must_use]
    pub fn with_restoration(mut self, restoration: ScrollRestoration) -> Self {
        self.restoration = Some(restoration);
        self
    }

    /// Initial viewport height in pixels.
    #[must_use]
    pub fn with_viewport(mut self, height: u32) -> Self {
        self.renderer.set_viewport_height(height);
        self
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Activate the session for `identity` with `filters` and fetch the
    /// first page.
    ///
    /// Remounting a preserved session with unchanged filters revalidates the
    /// loaded list instead of replacing it.
    pub fn mount(&mut self, identity: ListIdentity, filters: Filters) {
        let _span = tracing::info_span!("feedline.session.mount", list = %identity).entered();
        if self.store.set_filters(filters) {
            self.renderer.scroll_to_top();
        }
        self.identity = Some(identity);
        self.restore_pending = self.restoration.is_some();
        let request = self.store.begin_initial();
        tracing::debug!(kind = request.kind.as_str(), ticket = request.ticket, "first page requested");
        self.spawn_fetch(request);
        self.attempt_restore();
    }

    /// Leave the list.
    ///
    /// With `preserve`, the row at the top of the viewport is saved for
    /// restoration and the loaded list is kept for a later remount. Without
    /// it, everything is reset and outstanding responses become stale.
    pub fn unmount(&mut self, preserve: bool) {
        let _span = tracing::info_span!("feedline.session.unmount", preserve).entered();
        if preserve {
            if let Some(id) = self.top_item_id() {
                self.save_scroll_target(&id);
            }
        } else {
            self.store.reset();
            self.heights.clear();
            self.loader.set_loaded(0, false);
            self.renderer.scroll_to_top();
            self.last_error = None;
        }
        self.identity = None;
        self.restore_pending = false;
        self.new_items_available = false;
    }

    /// Change the filters. Returns whether the signature changed (and a new
    /// first page was requested).
    pub fn set_filters(&mut self, filters: Filters) -> bool {
        let _span = tracing::debug_span!("feedline.session.set_filters").entered();
        if !self.store.set_filters(filters) {
            return false;
        }
        self.renderer.scroll_to_top();
        let request = self.store.begin_initial();
        self.spawn_fetch(request);
        true
    }

    /// Explicit refresh: refetch the first page and replace the list.
    pub fn refresh(&mut self) {
        let _span = tracing::debug_span!("feedline.session.refresh").entered();
        self.new_items_available = false;
        let request = self.store.begin_refresh();
        self.spawn_fetch(request);
    }

    /// Background re-fetch of the first page; keeps the list when the
    /// signature is unchanged.
    pub fn revalidate(&mut self) {
        let request = self.store.begin_initial();
        self.spawn_fetch(request);
    }

    /// Manual retry after automatic retries were exhausted.
    pub fn retry(&mut self) -> bool {
        let Some(request) = self.store.retry() else {
            return false;
        };
        self.last_error = None;
        self.loader.rearm();
        self.spawn_fetch(request);
        true
    }

    // ── Viewport ─────────────────────────────────────────────────────────

    /// Scroll by `delta` pixels.
    pub fn scroll_by(&mut self, delta: i64) {
        self.renderer.scroll_by(delta);
    }

    /// Scroll to an absolute pixel offset.
    pub fn scroll_to(&mut self, offset: u64) {
        self.renderer.scroll_to(offset);
    }

    /// The host resized the viewport.
    pub fn set_viewport_height(&mut self, height: u32) {
        self.renderer.set_viewport_height(height);
    }

    /// Report a measured row height. First measurement wins.
    pub fn record_row_height(&mut self, index: usize, height: u32) -> bool {
        self.heights.record_height(index, height)
    }

    /// Compute the rows to draw and fire the next-page load when the
    /// rendered range nears the end of the loaded items.
    pub fn frame(&mut self) -> RenderWindow {
        let _span = tracing::debug_span!("feedline.session.frame").entered();
        let loaded = self.store.len();
        self.heights.invalidate_if_shrunk(loaded);
        self.loader.set_loaded(loaded, self.store.has_more());
        let row_count = self.loader.row_count(self.config.placeholder_rows);
        let window = self.renderer.compute(row_count, &self.heights, &self.loader);
        if self.loader.notify_rendered_range(window.range.clone()) == LoadTrigger::LoadMore
            && !self.load_more()
        {
            // The store is busy or not ready; ask again on a later frame.
            self.loader.rearm();
        }
        window
    }

    /// Request the next page now, if the store allows it.
    pub fn load_more(&mut self) -> bool {
        match self.store.load_more() {
            Some(request) => {
                self.spawn_fetch(request);
                true
            }
            None => false,
        }
    }

    // ── Optimistic patches ───────────────────────────────────────────────

    /// Apply `patch` locally and, with a sink, send it to the backend.
    pub fn patch_item(&mut self, id: &str, patch: ItemPatch) -> Option<PatchTicket> {
        let ticket = self.store.patch_item(id, patch)?;
        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            let sender = self.sender.clone();
            let id = ItemId::new(id);
            self.spawn(move || {
                let result = sink.apply_patch(&id, &patch);
                let _ = sender.send(FeedMsg::PatchSettled { ticket, result });
            });
        }
        Some(ticket)
    }

    /// Keep a patch's values.
    pub fn confirm_patch(&mut self, ticket: PatchTicket) -> bool {
        self.store.confirm_patch(ticket)
    }

    /// Undo a patch.
    pub fn rollback_patch(&mut self, ticket: PatchTicket) -> bool {
        self.store.rollback_patch(ticket)
    }

    // ── Scroll restoration ───────────────────────────────────────────────

    /// Remember `id` as the row to return to in the mounted list.
    pub fn save_scroll_target(&self, id: &ItemId) -> bool {
        match (&self.restoration, &self.identity) {
            (Some(restoration), Some(identity)) => {
                restoration.save_target(id, identity);
                true
            }
            _ => false,
        }
    }

    /// Id of the loaded row at the top of the viewport.
    #[must_use]
    pub fn top_item_id(&self) -> Option<ItemId> {
        let items = self.store.items();
        if items.is_empty() {
            return None;
        }
        let index = self
            .heights
            .index_at_offset(self.renderer.scroll_offset(), items.len());
        items.get(index).map(|item| item.id.clone())
    }

    fn attempt_restore(&mut self) {
        if !self.restore_pending {
            return;
        }
        let (Some(restoration), Some(identity)) = (&self.restoration, &self.identity) else {
            self.restore_pending = false;
            return;
        };
        let still_loading = self.store.phase().is_loading();
        match restoration.try_restore(self.store.items(), identity, still_loading) {
            RestoreOutcome::Restored(index) => {
                self.renderer.scroll_to_index(index);
                self.restore_pending = false;
            }
            RestoreOutcome::Pending => {}
            RestoreOutcome::NoToken | RestoreOutcome::Discarded | RestoreOutcome::GaveUp => {
                self.restore_pending = false;
            }
        }
    }

    // ── Push ─────────────────────────────────────────────────────────────

    /// React to a `new_articles` push event. Never touches the loaded list;
    /// raises [`new_items_available`](Self::new_items_available) when the
    /// mounted list is affected.
    pub fn note_new_articles(&mut self, event: &NewArticles) -> bool {
        let affected = self
            .identity
            .as_ref()
            .is_some_and(|identity| identity.affected_by(event));
        if affected {
            self.new_items_available = true;
            tracing::debug!(count = event.count, "new items available");
        }
        affected
    }

    // ── Message pump ─────────────────────────────────────────────────────

    /// Apply every queued background result. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.receiver.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.handle(msg);
            applied += 1;
        }
        self.reap_finished_tasks();
        applied
    }

    /// Pump until no background work is outstanding or `timeout` elapses.
    ///
    /// Returns `true` when idle.
    pub fn pump_until_idle(&mut self, timeout: Duration) -> bool {
        let _span = tracing::debug_span!("feedline.session.pump", in_flight = self.in_flight)
            .entered();
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if self.in_flight == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(in_flight = self.in_flight, "pump timed out");
                return false;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(msg) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    self.handle(msg);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => return false,
                Err(mpsc::RecvTimeoutError::Disconnected) => return true,
            }
        }
    }

    fn handle(&mut self, msg: FeedMsg) {
        match msg {
            FeedMsg::PageLoaded { request, result } => {
                if request.kind == RequestKind::NextPage {
                    self.on_next_page(&request, result);
                } else {
                    self.on_first_page(&request, result);
                }
            }
            FeedMsg::RetryDue(request) => {
                if let Some(request) = self.store.retry_request(&request) {
                    self.spawn_fetch(request);
                }
            }
            FeedMsg::PatchSettled { ticket, result } => match result {
                Ok(()) => {
                    self.store.confirm_patch(ticket);
                }
                Err(error) => {
                    tracing::warn!(%ticket, %error, "patch rejected, rolling back");
                    self.store.rollback_patch(ticket);
                    self.last_error = Some(error);
                }
            },
        }
    }

    fn on_first_page(&mut self, request: &PageRequest, result: Result<Page, FetchError>) {
        match self.store.complete_initial(request, result) {
            InitOutcome::Applied(applied) => {
                self.last_error = None;
                if applied == InitApplied::Replaced && request.kind == RequestKind::Refresh {
                    self.renderer.scroll_to_top();
                }
                self.attempt_restore();
            }
            InitOutcome::Failed(error) => {
                self.last_error = Some(error);
                self.attempt_restore();
            }
            InitOutcome::Stale => {}
        }
    }

    fn on_next_page(&mut self, request: &PageRequest, result: Result<Page, FetchError>) {
        match self.store.complete_load_more(request, result) {
            LoadOutcome::Appended { .. } => {
                // A page of duplicates leaves the count unchanged.
                self.loader.rearm();
                self.last_error = None;
                self.attempt_restore();
            }
            LoadOutcome::RetryScheduled { after, request } => {
                let sender = self.sender.clone();
                self.spawn(move || {
                    thread::sleep(after);
                    let _ = sender.send(FeedMsg::RetryDue(request));
                });
            }
            LoadOutcome::RetryExhausted(error) => {
                self.last_error = Some(error);
                self.attempt_restore();
            }
            LoadOutcome::Stale => {}
        }
    }

    fn spawn_fetch(&mut self, request: PageRequest) {
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        self.spawn(move || {
            let result = source.fetch_page(&request);
            let _ = sender.send(FeedMsg::PageLoaded { request, result });
        });
    }

    fn spawn(&mut self, task: impl FnOnce() + Send + 'static) {
        self.task_handles.push(thread::spawn(task));
        self.in_flight += 1;
    }

    fn reap_finished_tasks(&mut self) {
        if self.task_handles.is_empty() {
            return;
        }
        let mut remaining = Vec::with_capacity(self.task_handles.len());
        for handle in self.task_handles.drain(..) {
            if handle.is_finished() {
                if let Err(payload) = handle.join() {
                    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                        (*s).to_owned()
                    } else if let Some(s) = payload.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "unknown panic payload".to_owned()
                    };
                    // A panicked task never posts its message.
                    self.in_flight = self.in_flight.saturating_sub(1);
                    tracing::error!("background task panicked: {msg}");
                }
            } else {
                remaining.push(handle);
            }
        }
        self.task_handles = remaining;
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Loaded items in display order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        self.store.items()
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &PaginationStore {
        &self.store
    }

    /// Store flags.
    #[must_use]
    pub fn snapshot(&self) -> PaginationSnapshot {
        self.store.snapshot()
    }

    /// Loading phase.
    #[must_use]
    pub fn phase(&self) -> LoadPhase {
        self.store.phase()
    }

    /// Mounted list, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&ListIdentity> {
        self.identity.as_ref()
    }

    /// Whether a push event announced items the loaded list does not show.
    #[must_use]
    pub fn new_items_available(&self) -> bool {
        self.new_items_available
    }

    /// Last fetch or patch failure not yet superseded by a success.
    #[must_use]
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Row-height cache.
    #[must_use]
    pub fn heights(&self) -> &RowHeightCache {
        &self.heights
    }

    /// Windowed renderer.
    #[must_use]
    pub fn renderer(&self) -> &WindowedRenderer {
        &self.renderer
    }

    /// Background tasks whose result has not been applied yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

impl std::fmt::Debug for FeedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSession")
            .field("identity", &self.identity)
            .field("phase", &self.store.phase())
            .field("items", &self.store.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryBackend;
    use crate::storage::SessionStore;

    const WAIT: Duration = Duration::from_secs(2);

    fn config() -> FeedConfig {
        FeedConfig::default()
            .with_page_size(10)
            .with_load_threshold(3)
            .with_overscan(2)
            .with_default_row_height(20)
            .with_retry_backoff(Duration::from_millis(5))
    }

    fn session(backend: &Arc<MemoryBackend>) -> FeedSession {
        FeedSession::new(config(), Arc::clone(backend) as Arc<dyn PageSource>).with_viewport(100)
    }

    #[test]
    fn mount_loads_first_page() {
        let backend = Arc::new(MemoryBackend::generated(25));
        let mut s = session(&backend);
        s.mount(ListIdentity::All, Filters::new());
        assert_eq!(s.phase(), LoadPhase::Initializing);
        assert!(s.pump_until_idle(WAIT));
        assert_eq!(s.items().len(), 10);
        assert!(s.snapshot().has_more);
    }

    #[test]
    fn frame_near_end_loads_next_page_once() {
        let backend = Arc::new(MemoryBackend::generated(25));
        let mut s = session(&backend);
        s.mount(ListIdentity::All, Filters::new());
        s.pump_until_idle(WAIT);

        s.scroll_to(150);
        s.frame();
        s.frame();
        assert_eq!(s.in_flight(), 1);
        assert!(s.pump_until_idle(WAIT));
        assert_eq!(s.items().len(), 20);
        assert_eq!(backend.page_calls(), 2);
    }

    #[test]
    fn transient_failure_retries_automatically() {
        let backend = Arc::new(MemoryBackend::generated(25));
        let mut s = session(&backend);
        s.mount(ListIdentity::All, Filters::new());
        s.pump_until_idle(WAIT);

        backend.fail_pages([FetchError::Status(503)]);
        assert!(s.load_more());
        assert!(s.pump_until_idle(WAIT));
        assert_eq!(s.items().len(), 20);
        assert!(s.last_error().is_none());
    }

    #[test]
    fn two_failures_need_manual_retry() {
        let backend = Arc::new(MemoryBackend::generated(25));
        let mut s = session(&backend);
        s.mount(ListIdentity::All, Filters::new());
        s.pump_until_idle(WAIT);

        backend.fail_pages([FetchError::Status(503), FetchError::Status(503)]);
        s.load_more();
        s.pump_until_idle(WAIT);
        assert_eq!(s.phase(), LoadPhase::Retryable);
        assert_eq!(s.last_error(), Some(&FetchError::Status(503)));
        assert!(!s.load_more());

        assert!(s.retry());
        s.pump_until_idle(WAIT);
        assert_eq!(s.items().len(), 20);
    }

    #[test]
    fn rejected_patch_rolls_back() {
        let backend = Arc::new(MemoryBackend::generated(5));
        let mut s = session(&backend).with_patch_sink(Arc::clone(&backend) as Arc<dyn PatchSink>);
        s.mount(ListIdentity::All, Filters::new());
        s.pump_until_idle(WAIT);

        backend.fail_patches([FetchError::Status(500)]);
        s.patch_item("item-0001", ItemPatch::read(true)).expect("patched");
        assert!(s.store().get("item-0001").is_some_and(|i| i.is_read));
        s.pump_until_idle(WAIT);
        assert!(s.store().get("item-0001").is_some_and(|i| !i.is_read));
        assert_eq!(s.store().pending_patches(), 0);
    }

    #[test]
    fn accepted_patch_is_confirmed() {
        let backend = Arc::new(MemoryBackend::generated(5));
        let mut s = session(&backend).with_patch_sink(Arc::clone(&backend) as Arc<dyn PatchSink>);
        s.mount(ListIdentity::All, Filters::new());
        s.pump_until_idle(WAIT);

        s.patch_item("item-0002", ItemPatch::saved(true)).expect("patched");
        s.pump_until_idle(WAIT);
        assert!(s.store().get("item-0002").is_some_and(|i| i.is_saved));
        assert!(backend.item("item-0002").is_some_and(|i| i.is_saved));
        assert_eq!(s.store().pending_patches(), 0);
    }

    #[test]
    fn restoration_scrolls_to_saved_row() {
        let backend = Arc::new(MemoryBackend::generated(25));
        let storage = SessionStore::in_memory().shared();
        let mut first = session(&backend).with_restoration(ScrollRestoration::new(Arc::clone(&storage)));
        first.mount(ListIdentity::All, Filters::new());
        first.pump_until_idle(WAIT);
        first.scroll_to(60);
        first.frame();
        assert_eq!(first.top_item_id(), Some(ItemId::new("item-0003")));
        first.unmount(true);

        let mut second = session(&backend).with_restoration(ScrollRestoration::new(storage));
        second.mount(ListIdentity::All, Filters::new());
        second.pump_until_idle(WAIT);
        let window = second.frame();
        assert_eq!(window.scroll_offset, 60);
    }

    #[test]
    fn new_articles_flag_only_for_affected_list() {
        let backend = Arc::new(MemoryBackend::generated(5));
        let mut s = session(&backend);
        s.mount(ListIdentity::Feed("feed-1".into()), Filters::new().with_feed("feed-1"));
        let other = NewArticles {
            count: 1,
            feed_ids: vec!["feed-2".into()],
            ..NewArticles::default()
        };
        assert!(!s.note_new_articles(&other));
        let ours = NewArticles {
            count: 1,
            feed_ids: vec!["feed-1".into()],
            ..NewArticles::default()
        };
        assert!(s.note_new_articles(&ours));
        assert!(s.new_items_available());
        s.refresh();
        assert!(!s.new_items_available());
    }
}
