#![forbid(unsafe_code)]

//! Scroll restoration through full session remounts.

use std::sync::Arc;
use std::time::Duration;

use feedline_core::{FeedConfig, Filters, ItemId};
use feedline_runtime::{
    FeedSession, ListIdentity, MemoryBackend, PageSource, RESTORE_KEY, ScrollRestoration,
    SessionStore,
};

const WAIT: Duration = Duration::from_secs(2);

fn session(backend: &Arc<MemoryBackend>, storage: &Arc<SessionStore>) -> FeedSession {
    let config = FeedConfig::default()
        .with_page_size(20)
        .with_default_row_height(50);
    FeedSession::new(config, Arc::clone(backend) as Arc<dyn PageSource>)
        .with_viewport(200)
        .with_restoration(ScrollRestoration::new(Arc::clone(storage)))
}

#[test]
fn same_list_restores_saved_row() {
    let backend = Arc::new(MemoryBackend::generated(60));
    let storage = SessionStore::in_memory().shared();

    let mut list = session(&backend, &storage);
    list.mount(ListIdentity::All, Filters::new());
    list.pump_until_idle(WAIT);
    list.save_scroll_target(&ItemId::new("item-0012"));
    list.unmount(false);

    let mut again = session(&backend, &storage);
    again.mount(ListIdentity::All, Filters::new());
    again.pump_until_idle(WAIT);
    assert_eq!(again.frame().scroll_offset, 12 * 50);
    assert!(storage.get(RESTORE_KEY).is_none());
}

#[test]
fn token_from_another_list_is_discarded() {
    let backend = Arc::new(MemoryBackend::generated(60));
    let storage = SessionStore::in_memory().shared();

    let mut all = session(&backend, &storage);
    all.mount(ListIdentity::All, Filters::new());
    all.pump_until_idle(WAIT);
    assert!(all.save_scroll_target(&ItemId::new("item-0001")));
    all.unmount(false);

    // item-0001 is also in feed-1, but the token was saved for /articles.
    let feed = ListIdentity::Feed("feed-1".into());
    let mut other = session(&backend, &storage);
    other.mount(feed.clone(), feed.base_filters());
    other.pump_until_idle(WAIT);
    assert!(other.items().iter().any(|i| i.id.as_str() == "item-0001"));
    assert_eq!(other.frame().scroll_offset, 0);
    assert!(storage.get(RESTORE_KEY).is_none());
}

#[test]
fn feed_paths_are_compared_exactly() {
    let storage = SessionStore::in_memory().shared();
    let restoration = ScrollRestoration::new(Arc::clone(&storage));
    restoration.save_target(&ItemId::new("a"), &ListIdentity::All);
    assert_eq!(
        restoration.peek().map(|t| t.source_list_identity),
        Some("/articles".to_owned())
    );

    let backend = Arc::new(MemoryBackend::generated(5));
    let feed42 = ListIdentity::Feed("42".into());
    let mut s = session(&backend, &storage);
    s.mount(feed42.clone(), feed42.base_filters());
    s.pump_until_idle(WAIT);
    assert!(restoration.peek().is_none());
}

#[test]
fn preserved_unmount_saves_top_row() {
    let backend = Arc::new(MemoryBackend::generated(60));
    let storage = SessionStore::in_memory().shared();

    let mut list = session(&backend, &storage);
    list.mount(ListIdentity::Saved, ListIdentity::Saved.base_filters());
    list.pump_until_idle(WAIT);
    list.scroll_to(100);
    list.frame();
    let top = list.top_item_id().expect("rows loaded");
    list.unmount(true);

    let token = ScrollRestoration::new(Arc::clone(&storage))
        .peek()
        .expect("token saved");
    assert_eq!(token.target_item_id, top);
    assert_eq!(token.source_list_identity, "/saved");
}

#[test]
fn target_outside_first_page_gives_up() {
    let backend = Arc::new(MemoryBackend::generated(60));
    let storage = SessionStore::in_memory().shared();
    ScrollRestoration::new(Arc::clone(&storage))
        .save_target(&ItemId::new("item-0055"), &ListIdentity::All);

    let mut s = session(&backend, &storage);
    s.mount(ListIdentity::All, Filters::new());
    s.pump_until_idle(WAIT);
    assert_eq!(s.items().len(), 20);
    assert_eq!(s.frame().scroll_offset, 0);
    assert!(storage.get(RESTORE_KEY).is_none());
}
