#![forbid(unsafe_code)]

//! Server-push channel.
//!
//! A [`LiveChannel`] owns one background reader thread per open connection.
//! The reader pulls byte frames from a [`PushTransport`], decodes them with
//! [`SseDecoder`] and forwards raw events to the owning thread over an mpsc
//! channel. Nothing is delivered until the owner calls
//! [`dispatch_pending`](LiveChannel::dispatch_pending), so listeners always
//! run on the same thread as the rest of the session state.
//!
//! Transport failures never surface as errors: the reader marks the channel
//! [`ConnectionState::Disconnected`], waits for the reconnect delay (or the
//! server's `retry:` hint) and connects again, sending the last seen event
//! id. Listeners live on the owner side and are untouched by reconnects.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──open()──► Connecting ──► Connected ──error──► Disconnected
//!                       ▲                                    │
//!                       └───────────── reconnect delay ──────┘
//! close() / Drop: stop reader, join, drop listeners ──► Closed
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use feedline_core::{PushEvent, PushEventKind, RawEvent, SseDecoder, SseItem};

use crate::summary::SummaryCache;

/// Transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    Connect(String),
    /// An established connection failed while reading.
    Read(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "connect failed: {msg}"),
            Self::Read(msg) => write!(f, "read failed: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Outcome of one read from a push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult {
    /// Bytes arrived.
    Frame(Vec<u8>),
    /// Nothing arrived within the timeout.
    Idle,
    /// The server ended the stream.
    Closed,
}

/// Opens push streams.
pub trait PushTransport: Send + Sync {
    /// Connect, resuming after `last_event_id` when given.
    fn connect(&self, last_event_id: Option<&str>) -> Result<Box<dyn PushStream>, TransportError>;
}

/// An open push stream.
pub trait PushStream: Send {
    /// Wait up to `timeout` for the next frame.
    fn next_frame(&mut self, timeout: Duration) -> Result<FrameResult, TransportError>;
}

/// Connection state as seen by the reader thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not open.
    Closed,
    /// Connecting (first time or after a failure).
    Connecting,
    /// Stream established.
    Connected,
    /// Lost the stream; waiting to reconnect.
    Disconnected,
}

#[derive(Debug)]
struct LinkStatus {
    state: ConnectionState,
    reconnects: u64,
}

type SharedStatus = Arc<Mutex<LinkStatus>>;

fn set_state(status: &SharedStatus, state: ConnectionState) {
    status.lock().unwrap_or_else(PoisonError::into_inner).state = state;
}

/// Stop flag shared with the reader thread.
#[derive(Clone)]
struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    fn new() -> (Self, StopTrigger) {
        let inner = Arc::new((Mutex::new(false), Condvar::new()));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            StopTrigger { inner },
        )
    }

    fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `duration` unless stopped first. Returns `true` if stopped.
    fn wait_timeout(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        loop {
            if *stopped {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(stopped, duration - elapsed)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
    }
}

struct StopTrigger {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopTrigger {
    fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }
}

struct Reader {
    trigger: StopTrigger,
    thread: Option<thread::JoinHandle<()>>,
    events: mpsc::Receiver<RawEvent>,
}

impl Reader {
    fn stop(mut self) {
        self.trigger.stop();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(String);

impl ListenerId {
    /// Wrap a caller-chosen name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Name as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ListenerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

type Handler = Box<dyn FnMut(&PushEvent)>;

struct Listener {
    id: ListenerId,
    handler: Handler,
}

/// Push subscription for one authenticated session.
pub struct LiveChannel {
    transport: Arc<dyn PushTransport>,
    reconnect_delay: Duration,
    poll_interval: Duration,
    status: SharedStatus,
    listeners: HashMap<PushEventKind, Vec<Listener>>,
    reader: Option<Reader>,
    dropped: u64,
}

impl LiveChannel {
    /// Closed channel over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn PushTransport>, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            reconnect_delay,
            poll_interval: Duration::from_millis(100),
            status: Arc::new(Mutex::new(LinkStatus {
                state: ConnectionState::Closed,
                reconnects: 0,
            })),
            listeners: HashMap::new(),
            reader: None,
            dropped: 0,
        }
    }

    /// How long the reader blocks on one read before checking for stop.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Register `handler` for `kind` under `id`.
    ///
    /// Returns `false` (and keeps the existing handler) when `id` is already
    /// registered for `kind`.
    pub fn on(
        &mut self,
        kind: PushEventKind,
        id: impl Into<ListenerId>,
        handler: impl FnMut(&PushEvent) + 'static,
    ) -> bool {
        let id = id.into();
        let slot = self.listeners.entry(kind).or_default();
        if slot.iter().any(|l| l.id == id) {
            tracing::trace!(kind = %kind, id = id.as_str(), "listener already registered");
            return false;
        }
        slot.push(Listener {
            id,
            handler: Box::new(handler),
        });
        true
    }

    /// Remove every registration of `id`. Returns how many were removed.
    pub fn off(&mut self, id: &ListenerId) -> usize {
        let mut removed = 0;
        for slot in self.listeners.values_mut() {
            let before = slot.len();
            slot.retain(|l| &l.id != id);
            removed += before - slot.len();
        }
        self.listeners.retain(|_, slot| !slot.is_empty());
        removed
    }

    /// Number of registered listeners across all kinds.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Start the reader. Returns `false` if already open.
    pub fn open(&mut self) -> bool {
        if self.reader.is_some() {
            return false;
        }
        let (signal, trigger) = StopSignal::new();
        let (tx, rx) = mpsc::channel();
        set_state(&self.status, ConnectionState::Connecting);

        let transport = Arc::clone(&self.transport);
        let status = Arc::clone(&self.status);
        let delay = self.reconnect_delay;
        let poll = self.poll_interval;
        let thread = thread::Builder::new()
            .name("feedline-live".into())
            .spawn(move || run_reader(transport.as_ref(), &tx, &signal, &status, delay, poll));

        match thread {
            Ok(handle) => {
                self.reader = Some(Reader {
                    trigger,
                    thread: Some(handle),
                    events: rx,
                });
                tracing::info!("push channel opened");
                true
            }
            Err(error) => {
                tracing::warn!(%error, "failed to spawn push reader");
                set_state(&self.status, ConnectionState::Closed);
                false
            }
        }
    }

    /// Stop the reader, join it and drop every listener.
    pub fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stop();
            tracing::info!("push channel closed");
        }
        self.listeners.clear();
        set_state(&self.status, ConnectionState::Closed);
    }

    /// Whether the reader is running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Reconnect attempts since the channel was created.
    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reconnects
    }

    /// Events dropped because their payload did not decode.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Deliver queued events to listeners and apply summary invalidation.
    ///
    /// Returns the delivered events in arrival order.
    pub fn dispatch_pending(&mut self, summaries: &mut SummaryCache) -> Vec<PushEvent> {
        let Some(reader) = &self.reader else {
            return Vec::new();
        };
        let raw: Vec<RawEvent> = reader.events.try_iter().collect();
        let mut delivered = Vec::with_capacity(raw.len());
        for event in raw {
            match PushEvent::decode(&event) {
                Ok(Some(decoded)) => {
                    if let PushEvent::NewArticles(payload) = &decoded {
                        summaries.apply_new_articles(payload);
                    }
                    if let Some(slot) = self.listeners.get_mut(&decoded.kind()) {
                        for listener in slot.iter_mut() {
                            (listener.handler)(&decoded);
                        }
                    }
                    delivered.push(decoded);
                }
                Ok(None) => {
                    tracing::debug!(name = %event.name, "ignoring unknown push event");
                }
                Err(error) => {
                    self.dropped += 1;
                    tracing::warn!(%error, id = ?event.id, "dropping malformed push event");
                }
            }
        }
        delivered
    }
}

impl fmt::Debug for LiveChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveChannel")
            .field("state", &self.state())
            .field("open", &self.is_open())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_reader(
    transport: &dyn PushTransport,
    tx: &mpsc::Sender<RawEvent>,
    stop: &StopSignal,
    status: &SharedStatus,
    reconnect_delay: Duration,
    poll: Duration,
) {
    let _span = tracing::info_span!("feedline.live.reader").entered();
    let mut decoder = SseDecoder::new();
    let mut delay = reconnect_delay;

    'connection: while !stop.is_stopped() {
        set_state(status, ConnectionState::Connecting);
        let last_id = decoder.last_event_id().map(str::to_owned);
        match transport.connect(last_id.as_deref()) {
            Ok(mut stream) => {
                set_state(status, ConnectionState::Connected);
                tracing::debug!(last_event_id = ?last_id, "push stream connected");
                loop {
                    if stop.is_stopped() {
                        break 'connection;
                    }
                    match stream.next_frame(poll) {
                        Ok(FrameResult::Frame(bytes)) => {
                            for item in decoder.feed(&bytes) {
                                match item {
                                    SseItem::Event(event) => {
                                        if tx.send(event).is_err() {
                                            break 'connection;
                                        }
                                    }
                                    SseItem::Retry(hint) => delay = hint,
                                }
                            }
                        }
                        Ok(FrameResult::Idle) => {}
                        Ok(FrameResult::Closed) => {
                            tracing::warn!("push stream closed by server");
                            break;
                        }
                        Err(error) => {
                            tracing::warn!(%error, "push stream failed");
                            break;
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "push connect failed");
            }
        }

        decoder.reset_partial();
        {
            let mut link = status.lock().unwrap_or_else(PoisonError::into_inner);
            link.state = ConnectionState::Disconnected;
            link.reconnects += 1;
        }
        tracing::debug!(delay_ms = delay.as_millis() as u64, "push reconnect scheduled");
        if stop.wait_timeout(delay) {
            break;
        }
    }
    set_state(status, ConnectionState::Closed);
}

/// How a scripted connection ends once its frames are exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// Server closes the stream.
    Close,
    /// The read fails.
    Fail(String),
    /// Stay open and serve frames given to [`MemoryTransport::push`].
    Stay,
}

#[derive(Debug)]
enum Plan {
    Refuse(String),
    Serve(VecDeque<Vec<u8>>, StreamEnd),
}

#[derive(Debug, Default)]
struct TransportState {
    plans: VecDeque<Plan>,
    live: VecDeque<Vec<u8>>,
    connects: usize,
    last_event_ids: Vec<Option<String>>,
}

/// Scripted in-process transport.
///
/// Each `connect` consumes the next plan; with no plans left the connection
/// stays open and serves pushed frames.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MemoryTransport {
    /// Transport with no plans.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse the next connection attempt.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.lock().plans.push_back(Plan::Refuse(reason.into()));
    }

    /// Serve `frames` on the next connection, then end it as `end`.
    pub fn serve<I, B>(&self, frames: I, end: StreamEnd)
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let frames = frames.into_iter().map(Into::into).collect();
        self.lock().plans.push_back(Plan::Serve(frames, end));
    }

    /// Queue a frame for whichever stream is staying open.
    pub fn push(&self, frame: impl Into<Vec<u8>>) {
        self.lock().live.push_back(frame.into());
    }

    /// Connections established or refused so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// `Last-Event-ID` presented on each connection attempt.
    #[must_use]
    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.lock().last_event_ids.clone()
    }
}

impl PushTransport for MemoryTransport {
    fn connect(&self, last_event_id: Option<&str>) -> Result<Box<dyn PushStream>, TransportError> {
        let mut state = self.lock();
        state.connects += 1;
        state.last_event_ids.push(last_event_id.map(str::to_owned));
        match state.plans.pop_front() {
            Some(Plan::Refuse(reason)) => Err(TransportError::Connect(reason)),
            Some(Plan::Serve(frames, end)) => Ok(Box::new(MemoryStream {
                transport: self.clone(),
                frames,
                end,
            })),
            None => Ok(Box::new(MemoryStream {
                transport: self.clone(),
                frames: VecDeque::new(),
                end: StreamEnd::Stay,
            })),
        }
    }
}

struct MemoryStream {
    transport: MemoryTransport,
    frames: VecDeque<Vec<u8>>,
    end: StreamEnd,
}

impl PushStream for MemoryStream {
    fn next_frame(&mut self, timeout: Duration) -> Result<FrameResult, TransportError> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(FrameResult::Frame(frame));
        }
        match &self.end {
            StreamEnd::Close => Ok(FrameResult::Closed),
            StreamEnd::Fail(reason) => Err(TransportError::Read(reason.clone())),
            StreamEnd::Stay => {
                if let Some(frame) = self.transport.lock().live.pop_front() {
                    return Ok(FrameResult::Frame(frame));
                }
                thread::sleep(timeout);
                Ok(FrameResult::Idle)
            }
        }
    }
}
