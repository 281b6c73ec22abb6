#![forbid(unsafe_code)]

//! Scripted smoke run of the feed pipeline.
//!
//! Drives one list session against the in-memory backend and push transport:
//! initial load, scrolling with measured rows, a transient page failure, an
//! optimistic patch the backend rejects, a filter change, a push event, and a
//! remount that restores the scroll position. Prints a JSON report to stdout.
//!
//! # Running
//!
//! ```sh
//! FEEDLINE_LOG=debug cargo run -p feedline-harness
//! FEEDLINE_LOG_JSON=1 cargo run -p feedline-harness --features tracing
//! ```
//!
//! `FEEDLINE_LOG` takes an `EnvFilter` directive and falls back to
//! `RUST_LOG`, then `info`. Pipeline settings come from `FEEDLINE_*` (see
//! `FeedConfig::from_env`).

use std::sync::Arc;
use std::time::Duration;

use feedline::prelude::*;
use feedline::{
    FetchError, MemoryBackend, MemoryTransport, PageSource, PatchSink, SessionStore, Summary,
    SummaryCache,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ARTICLES: usize = 120;
const VIEWPORT: u32 = 720;
const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let filter = std::env::var("FEEDLINE_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let json = std::env::var("FEEDLINE_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Simulated measured height of row `index`.
fn measured_height(index: usize) -> u32 {
    64 + (index % 3) as u32 * 24
}

/// Pump, lay out, and measure every rendered row once.
fn render(session: &mut FeedSession) -> feedline::RenderWindow {
    session.pump();
    let window = session.frame();
    for slot in window.rows.iter().filter(|slot| slot.is_loaded()) {
        session.record_row_height(slot.index, measured_height(slot.index));
    }
    window
}

fn scroll_to_end(session: &mut FeedSession, steps: usize) {
    for _ in 0..steps {
        session.scroll_by(i64::from(VIEWPORT) / 2);
        render(session);
        session.pump_until_idle(WAIT);
    }
}

fn new_session(
    config: &FeedConfig,
    backend: &Arc<MemoryBackend>,
    storage: &Arc<SessionStore>,
) -> FeedSession {
    FeedSession::new(config.clone(), Arc::clone(backend) as Arc<dyn PageSource>)
        .with_patch_sink(Arc::clone(backend) as Arc<dyn PatchSink>)
        .with_restoration(ScrollRestoration::new(Arc::clone(storage)))
        .with_viewport(VIEWPORT)
}

fn main() -> feedline::Result<()> {
    init_tracing();
    let config = FeedConfig::from_env()
        .with_retry_backoff(Duration::from_millis(50))
        .with_reconnect_delay(Duration::from_millis(100));
    config.validate()?;
    tracing::info!(?config, "harness starting");

    let backend = Arc::new(MemoryBackend::generated(ARTICLES).with_latency(Duration::from_millis(5)));
    let storage = SessionStore::in_memory().shared();

    let mut summaries = SummaryCache::new();
    summaries.insert(ListIdentity::All, Summary { unread: 80, total: ARTICLES as u64 });
    summaries.insert(ListIdentity::Feed("feed-1".into()), Summary { unread: 20, total: 30 });

    let transport = MemoryTransport::new();
    let mut live = LiveChannel::new(Arc::new(transport.clone()), config.reconnect_delay)
        .poll_interval(Duration::from_millis(10));
    live.on(PushEventKind::ImportProgress, "harness.progress", |event| {
        if let PushEvent::ImportProgress(progress) = event {
            tracing::info!(job = %progress.job_id, ratio = progress.ratio(), "import progress");
        }
    });
    live.open();

    // Initial load and a scroll through a few pages.
    let mut session = new_session(&config, &backend, &storage);
    session.mount(ListIdentity::All, Filters::new());
    session.pump_until_idle(WAIT);
    render(&mut session);
    scroll_to_end(&mut session, 6);
    let loaded_after_scroll = session.items().len();

    // One transient failure is retried without user action.
    backend.fail_pages([FetchError::Status(503)]);
    scroll_to_end(&mut session, 4);
    let loaded_after_retry = session.items().len();

    // The backend rejects a mark-as-read; the row flips back.
    backend.fail_patches([FetchError::Status(409)]);
    let target = session.items().first().map(|item| item.id.clone());
    if let Some(id) = &target {
        session.patch_item(id.as_str(), ItemPatch::read(true));
        session.pump_until_idle(WAIT);
    }
    let rolled_back = target.as_ref().is_some_and(|id| {
        let local = session.store().get(id.as_str()).map(|item| item.is_read);
        let server = backend.item(id.as_str()).map(|item| item.is_read);
        local.is_some() && local == server
    });

    // Filter change replaces the list.
    session.set_filters(Filters::new().with_read_state(ReadState::Unread));
    session.pump_until_idle(WAIT);
    let unread_loaded = session.items().len();

    // Push traffic: progress plus new articles for feed-1.
    transport.push("event: import_progress\ndata: {\"job_id\":\"opml-1\",\"processed\":2,\"total\":5}\n\n");
    transport.push("id: 1\nevent: new_articles\ndata: {\"count\":3,\"feed_ids\":[\"feed-1\"]}\n\n");
    std::thread::sleep(Duration::from_millis(100));
    for event in live.dispatch_pending(&mut summaries) {
        if let PushEvent::NewArticles(payload) = &event {
            session.note_new_articles(payload);
        }
    }
    let new_items_flag = session.new_items_available();

    // Leave and come back: the top row is restored.
    session.set_filters(Filters::new());
    session.pump_until_idle(WAIT);
    session.scroll_to(u64::from(VIEWPORT) * 2);
    render(&mut session);
    session.pump_until_idle(WAIT);
    let saved_top = session.top_item_id();
    session.unmount(true);

    let mut remounted = new_session(&config, &backend, &storage);
    remounted.mount(ListIdentity::All, Filters::new());
    remounted.pump_until_idle(WAIT);
    let window = render(&mut remounted);
    let restored_top = remounted.top_item_id();

    live.close();

    let report = serde_json::json!({
        "articles": ARTICLES,
        "loaded_after_scroll": loaded_after_scroll,
        "loaded_after_retry": loaded_after_retry,
        "page_calls": backend.page_calls(),
        "patch_calls": backend.patch_calls(),
        "patch_rolled_back": rolled_back,
        "unread_loaded": unread_loaded,
        "new_items_available": new_items_flag,
        "stale_summaries": summaries
            .stale_identities()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "restored": saved_top.is_some() && saved_top == restored_top,
        "restored_offset": window.scroll_offset,
        "push_reconnects": live.reconnect_count(),
        "phase": remounted.phase().as_str(),
    });
    println!("{report:#}");
    tracing::info!("harness finished");
    Ok(())
}
