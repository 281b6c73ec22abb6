#![forbid(unsafe_code)]

//! Tracing instrumentation tests.
//!
//! Spans enabled:
//!   cargo test -p feedline-widgets --features tracing --test tracing_tests
//!
//! Zero-overhead verification (no feature):
//!   cargo test -p feedline-widgets --test tracing_tests -- zero_overhead

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use feedline_widgets::{InfiniteLoader, RowHeightCache, WindowedRenderer};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Default, Clone)]
struct Captured {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl Captured {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

struct CaptureLayer(Captured);

impl<S> tracing_subscriber::Layer<S> for CaptureLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        self.0.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        if let Some((_, message)) = visitor.0.into_iter().find(|(name, _)| name == "message") {
            self.0.events.lock().unwrap().push(message);
        }
    }
}

fn with_capture<F: FnOnce()>(f: F) -> Captured {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(captured.clone()));
    tracing::subscriber::with_default(subscriber, f);
    captured
}

fn scroll_session() {
    let mut cache = RowHeightCache::new(40);
    cache.invalidate_if_shrunk(30);
    cache.record_height(0, 80);
    let mut loader = InfiniteLoader::new(5);
    loader.set_loaded(30, true);
    let mut renderer = WindowedRenderer::new(400, 2);
    renderer.scroll_to(1_000);
    let frame = renderer.compute(loader.row_count(3), &cache, &loader);
    loader.notify_rendered_range(frame.range);
    cache.invalidate_if_shrunk(5);
}

// ============================================================================
// Tests
// ============================================================================

#[test]
#[cfg(feature = "tracing")]
fn compute_opens_window_span_with_fields() {
    let captured = with_capture(scroll_session);
    let spans = captured.spans();
    let span = spans
        .iter()
        .find(|s| s.name == "window_compute")
        .expect("window_compute span");
    assert_eq!(span.fields.get("rows").map(String::as_str), Some("33"));
    assert_eq!(span.fields.get("viewport").map(String::as_str), Some("400"));
}

#[test]
#[cfg(feature = "tracing")]
fn threshold_and_shrink_emit_events() {
    let captured = with_capture(scroll_session);
    let events = captured.events();
    assert!(events.iter().any(|e| e.contains("load threshold crossed")), "{events:?}");
    assert!(events.iter().any(|e| e.contains("item count shrank")), "{events:?}");
}

#[test]
#[cfg(not(feature = "tracing"))]
fn zero_overhead_without_feature() {
    let captured = with_capture(scroll_session);
    assert!(captured.spans().is_empty());
    assert!(captured.events().is_empty());
}
