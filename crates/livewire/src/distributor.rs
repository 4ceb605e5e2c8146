//! Realtime distribution hub.
//!
//! [`RealTimeDistributor`] prefers a push channel and degrades to periodic
//! polling when the channel cannot be established or stays lost after the
//! reconnect budget. Subscribers register callbacks per event type (or under
//! the `*` wildcard); a single dispatcher task fans events out in arrival
//! order, and a panicking callback never affects its siblings.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backoff::ReconnectPolicy;
use crate::config::LiveWireConfig;
use crate::envelope::{event_types, DistributionEvent};
use crate::error::TransportError;
use crate::transport::{
    HttpPollTransport, PollTransport, PushEvent, PushSink, PushStream, PushTransport,
    WebSocketTransport,
};

const NORMAL_CLOSURE: u16 = 1000;
const ABNORMAL_CLOSURE: u16 = 1006;

/// Callback invoked for every delivered event envelope.
pub type EventCallback = Arc<dyn Fn(&DistributionEvent) + Send + Sync>;

type Registry = HashMap<String, Vec<(Uuid, EventCallback)>>;

// ============================================================================
// Connection state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Polling,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Polling => "polling",
            ConnectionState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Delivery mechanism currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Push,
    Polling,
    None,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionType::Push => "push",
            ConnectionType::Polling => "polling",
            ConnectionType::None => "none",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributorStatus {
    pub is_connected: bool,
    pub connection_type: ConnectionType,
    pub subscriber_count: usize,
    pub reconnect_attempts: u32,
}

// ============================================================================
// Distributor
// ============================================================================

#[derive(Default)]
struct TaskHandles {
    dispatcher: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

impl TaskHandles {
    /// Stops the channel-facing tasks, leaving the dispatcher running.
    fn abort_channels(&mut self) {
        let handles = [self.reader.take(), self.poller.take(), self.reconnect.take()];
        for handle in handles.into_iter().flatten() {
            handle.abort();
        }
    }

    fn take_all(&mut self) -> [Option<JoinHandle<()>>; 4] {
        [
            self.dispatcher.take(),
            self.reader.take(),
            self.poller.take(),
            self.reconnect.take(),
        ]
    }
}

struct Inner {
    config: LiveWireConfig,
    policy: ReconnectPolicy,
    push: Arc<dyn PushTransport>,
    poll: Arc<dyn PollTransport>,
    state: Mutex<ConnectionState>,
    registry: Mutex<Registry>,
    token: Mutex<String>,
    // Held across awaits while sending, hence the async mutex.
    sink: AsyncMutex<Option<Box<dyn PushSink>>>,
    dispatch_tx: Mutex<Option<mpsc::UnboundedSender<DistributionEvent>>>,
    tasks: Mutex<TaskHandles>,
    reconnect_attempts: AtomicU32,
    // Bumped on every teardown or re-initialize. Background tasks carry the
    // value they were spawned under and stand down once it moves on, even
    // when they outlive the abort sweep.
    generation: AtomicU64,
}

/// Cheaply cloneable handle; every clone shares one distribution hub.
#[derive(Clone)]
pub struct RealTimeDistributor {
    inner: Arc<Inner>,
}

impl RealTimeDistributor {
    pub fn new(
        config: LiveWireConfig,
        push: Arc<dyn PushTransport>,
        poll: Arc<dyn PollTransport>,
    ) -> Self {
        let policy = config.reconnect_policy();
        Self {
            inner: Arc::new(Inner {
                config,
                policy,
                push,
                poll,
                state: Mutex::new(ConnectionState::Disconnected),
                registry: Mutex::new(HashMap::new()),
                token: Mutex::new(String::new()),
                sink: AsyncMutex::new(None),
                dispatch_tx: Mutex::new(None),
                tasks: Mutex::new(TaskHandles::default()),
                reconnect_attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Wires up the production WebSocket and HTTP transports.
    pub fn from_config(config: LiveWireConfig) -> Self {
        let push = Arc::new(WebSocketTransport::new(config.push_url.clone()));
        let poll = Arc::new(HttpPollTransport::new(
            config.poll_url.clone(),
            config.request_update_url.clone(),
        ));
        Self::new(config, push, poll)
    }

    /// Establishes delivery, preferring push. Falls back to polling when the
    /// push connect fails or exceeds the configured timeout. Safe to call
    /// again for a fresh start with a new token.
    pub async fn initialize(&self, token: &str) -> ConnectionType {
        let inner = &self.inner;
        // Invalidate the previous generation before the abort sweep; a task
        // the sweep misses can then no longer act.
        let generation = inner.bump_generation(ConnectionState::Connecting);
        inner
            .tasks
            .lock()
            .expect("task lock poisoned")
            .abort_channels();
        if let Some(mut sink) = inner.sink.lock().await.take() {
            let _ = sink.close(NORMAL_CLOSURE).await;
        }
        *inner.token.lock().expect("token lock poisoned") = token.to_string();
        inner.reconnect_attempts.store(0, Ordering::SeqCst);
        ensure_dispatcher(inner);

        let connect_timeout: Duration = inner.config.connect_timeout.into();
        match timeout(connect_timeout, inner.push.connect(token)).await {
            Ok(Ok((sink, stream))) => {
                *inner.sink.lock().await = Some(sink);
                inner.set_state(ConnectionState::Connected);
                spawn_reader(inner, stream, generation);
                info!("push channel established");
                ConnectionType::Push
            }
            Ok(Err(e)) => {
                warn!(error = %e, "push connection failed, falling back to polling");
                start_polling(inner, generation);
                ConnectionType::Polling
            }
            Err(_) => {
                let e = TransportError::ConnectTimeout(connect_timeout);
                warn!(error = %e, "push connection failed, falling back to polling");
                start_polling(inner, generation);
                ConnectionType::Polling
            }
        }
    }

    /// Registers `callback` for `event_type` (or the `*` wildcard).
    ///
    /// The callback stays registered until [`Subscription::unsubscribe`] is
    /// called or the distributor is torn down; dropping the handle alone
    /// does not remove it.
    pub fn subscribe<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&DistributionEvent) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = Uuid::new_v4();
        self.inner
            .registry
            .lock()
            .expect("registry lock poisoned")
            .entry(event_type.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            event_type,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Best-effort notification over the push channel. Returns `false`
    /// instead of failing when the channel is not connected or the write
    /// errors.
    pub async fn send(&self, event_type: &str, payload: Value) -> bool {
        if self.state() != ConnectionState::Connected {
            debug!(event_type = %event_type, "send skipped, push channel not connected");
            return false;
        }
        let event = DistributionEvent::new(event_type, payload);
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize outbound event");
                return false;
            }
        };
        let mut sink = self.inner.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return false;
        };
        match sink.send_text(text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "push send failed");
                false
            }
        }
    }

    /// Asks the server for a fresh snapshot of `data_type`.
    ///
    /// While connected this rides the push channel; while polling it becomes
    /// a one-shot fetch whose response flows through the same delivery path
    /// as pushed events, so subscribers cannot tell the mechanisms apart.
    pub async fn request_update(&self, data_type: &str, params: Value) -> bool {
        let body = json!({ "dataType": data_type, "params": params });
        match self.state() {
            ConnectionState::Connected => self.send(event_types::REQUEST_UPDATE, body).await,
            ConnectionState::Polling => {
                let token = self.inner.token_snapshot();
                match self.inner.poll.request_update(&token, body).await {
                    Ok(raw) => {
                        self.inner.handle_message(&raw);
                        true
                    }
                    Err(e) => {
                        warn!(error = %e, "request-update fetch failed");
                        false
                    }
                }
            }
            state => {
                debug!(state = %state, "request-update skipped in current state");
                false
            }
        }
    }

    /// Full teardown: closes the push channel normally, stops every task,
    /// clears all subscriptions, and resets the reconnect counters.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        // Invalidate the generation before the abort sweep; a task the
        // sweep misses can then no longer act.
        inner.bump_generation(ConnectionState::Disconnected);
        let handles = inner
            .tasks
            .lock()
            .expect("task lock poisoned")
            .take_all();
        for handle in handles.into_iter().flatten() {
            handle.abort();
        }
        *inner.dispatch_tx.lock().expect("dispatch lock poisoned") = None;
        if let Some(mut sink) = inner.sink.lock().await.take() {
            // Best effort, the peer may already be gone.
            let _ = sink.close(NORMAL_CLOSURE).await;
        }
        inner
            .registry
            .lock()
            .expect("registry lock poisoned")
            .clear();
        inner.reconnect_attempts.store(0, Ordering::SeqCst);
        *inner.token.lock().expect("token lock poisoned") = String::new();
        info!("realtime distributor shut down");
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    pub fn status(&self) -> DistributorStatus {
        let state = self.state();
        let connection_type = match state {
            ConnectionState::Connected => ConnectionType::Push,
            ConnectionState::Polling => ConnectionType::Polling,
            _ => ConnectionType::None,
        };
        let subscriber_count = self
            .inner
            .registry
            .lock()
            .expect("registry lock poisoned")
            .values()
            .map(Vec::len)
            .sum();
        DistributorStatus {
            is_connected: state == ConnectionState::Connected,
            connection_type,
            subscriber_count,
            reconnect_attempts: self.inner.reconnect_attempts.load(Ordering::SeqCst),
        }
    }
}

/// Handle returned by [`RealTimeDistributor::subscribe`].
pub struct Subscription {
    id: Uuid,
    event_type: String,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Removes exactly this callback, dropping the event-type entry once its
    /// last subscriber is gone.
    pub fn unsubscribe(self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut registry = inner.registry.lock().expect("registry lock poisoned");
        if let Some(subscribers) = registry.get_mut(&self.event_type) {
            subscribers.retain(|(id, _)| *id != self.id);
            if subscribers.is_empty() {
                registry.remove(&self.event_type);
            }
        }
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// Starts a new generation and applies `state` in the same critical
    /// section, so the bump and the state write are indivisible.
    fn bump_generation(&self, state: ConnectionState) -> u64 {
        let mut guard = self.state.lock().expect("state lock poisoned");
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *guard = state;
        next
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Transition gate for background tasks: applies `state` only while
    /// `generation` is still current. A task spawned under an older
    /// generation gets `false` and must stand down.
    fn set_state_if_current(&self, generation: u64, state: ConnectionState) -> bool {
        let mut guard = self.state.lock().expect("state lock poisoned");
        if self.current_generation() != generation {
            return false;
        }
        *guard = state;
        true
    }

    fn token_snapshot(&self) -> String {
        self.token.lock().expect("token lock poisoned").clone()
    }

    /// Parses a raw transport payload and queues every contained event for
    /// ordered dispatch. Malformed payloads have already been dropped by the
    /// envelope parser.
    fn handle_message(&self, raw: &str) {
        let events = DistributionEvent::parse_batch(raw);
        if events.is_empty() {
            return;
        }
        let guard = self.dispatch_tx.lock().expect("dispatch lock poisoned");
        let Some(tx) = guard.as_ref() else {
            return;
        };
        for event in events {
            if tx.send(event).is_err() {
                debug!("dispatcher stopped, dropping event");
            }
        }
    }

    /// Invokes exact-type subscribers, then wildcard subscribers. A panic in
    /// one callback is logged and isolated from the rest.
    fn fan_out(&self, event: &DistributionEvent) {
        let callbacks: Vec<EventCallback> = {
            let registry = self.registry.lock().expect("registry lock poisoned");
            let mut list = Vec::new();
            if let Some(subscribers) = registry.get(&event.event_type) {
                list.extend(subscribers.iter().map(|(_, cb)| Arc::clone(cb)));
            }
            if event.event_type != event_types::WILDCARD {
                if let Some(subscribers) = registry.get(event_types::WILDCARD) {
                    list.extend(subscribers.iter().map(|(_, cb)| Arc::clone(cb)));
                }
            }
            list
        };
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(event_type = %event.event_type, "subscriber callback panicked");
            }
        }
    }
}

// ============================================================================
// Background tasks
// ============================================================================

/// Starts the dispatcher once per distributor. Tasks hold only a weak
/// reference so dropping the last handle winds everything down.
fn ensure_dispatcher(inner: &Arc<Inner>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<DistributionEvent>();
    {
        let mut guard = inner.dispatch_tx.lock().expect("dispatch lock poisoned");
        if guard.is_some() {
            return;
        }
        *guard = Some(tx);
    }
    let weak = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.fan_out(&event);
        }
    });
    inner.tasks.lock().expect("task lock poisoned").dispatcher = Some(handle);
}

fn spawn_reader(inner: &Arc<Inner>, mut stream: Box<dyn PushStream>, generation: u64) {
    let weak = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        let close_code = loop {
            match stream.next_event().await {
                Some(Ok(PushEvent::Text(text))) => {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    if inner.current_generation() != generation {
                        return;
                    }
                    inner.handle_message(&text);
                }
                Some(Ok(PushEvent::Closed { code })) => break Some(code),
                Some(Err(e)) => {
                    warn!(error = %e, "push channel error");
                    break None;
                }
                None => break None,
            }
        };

        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            // Checked under the sink lock: a teardown or re-initialize may
            // own the channel by now, and a stale reader must not touch it.
            let mut sink = inner.sink.lock().await;
            if inner.current_generation() != generation {
                return;
            }
            *sink = None;
        }
        match close_code {
            Some(NORMAL_CLOSURE) => {
                info!("push channel closed normally");
                inner.set_state_if_current(generation, ConnectionState::Disconnected);
            }
            other => {
                warn!(
                    code = other.unwrap_or(ABNORMAL_CLOSURE),
                    "push channel lost, scheduling reconnect"
                );
                spawn_reconnect(&inner, generation);
            }
        }
    });
    inner.tasks.lock().expect("task lock poisoned").reader = Some(handle);
}

fn start_polling(inner: &Arc<Inner>, generation: u64) {
    {
        let tasks = inner.tasks.lock().expect("task lock poisoned");
        if tasks.poller.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
    }
    if !inner.set_state_if_current(generation, ConnectionState::Polling) {
        return;
    }
    let poll_interval: Duration = inner.config.poll_interval.into();
    let weak = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        let mut ticker = interval(poll_interval);
        // The first tick completes immediately; swallow it so fetches start
        // one full interval from now.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            if inner.current_generation() != generation {
                break;
            }
            let token = inner.token_snapshot();
            match inner.poll.poll(&token).await {
                Ok(raw) => inner.handle_message(&raw),
                Err(e) => warn!(error = %e, "poll fetch failed"),
            }
        }
    });
    inner.tasks.lock().expect("task lock poisoned").poller = Some(handle);
    info!(interval = ?poll_interval, "polling for updates");
}

fn spawn_reconnect(inner: &Arc<Inner>, generation: u64) {
    {
        let tasks = inner.tasks.lock().expect("task lock poisoned");
        if tasks.reconnect.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
    }
    let policy = inner.policy;
    let connect_timeout: Duration = inner.config.connect_timeout.into();
    let weak = Arc::downgrade(inner);
    let handle = tokio::spawn(async move {
        for attempt in 1..=policy.max_attempts {
            {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.set_state_if_current(generation, ConnectionState::Error) {
                    return;
                }
                inner.reconnect_attempts.store(attempt, Ordering::SeqCst);
                info!(
                    attempt,
                    delay = ?policy.delay_for(attempt),
                    "scheduling push reconnect"
                );
            }
            sleep(policy.delay_for(attempt)).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.set_state_if_current(generation, ConnectionState::Connecting) {
                return;
            }
            let token = inner.token_snapshot();
            match timeout(connect_timeout, inner.push.connect(&token)).await {
                Ok(Ok((mut sink, stream))) => {
                    // The dial may have crossed a teardown; a stale
                    // generation must surrender the fresh channel instead
                    // of coming back connected.
                    if !inner.set_state_if_current(generation, ConnectionState::Connected) {
                        let _ = sink.close(NORMAL_CLOSURE).await;
                        return;
                    }
                    {
                        let mut slot = inner.sink.lock().await;
                        if inner.current_generation() == generation {
                            *slot = Some(sink);
                        } else {
                            drop(slot);
                            let _ = sink.close(NORMAL_CLOSURE).await;
                            return;
                        }
                    }
                    inner.reconnect_attempts.store(0, Ordering::SeqCst);
                    spawn_reader(&inner, stream, generation);
                    info!(attempt, "push channel re-established");
                    return;
                }
                Ok(Err(e)) => warn!(attempt, error = %e, "push reconnect failed"),
                Err(_) => warn!(attempt, "push reconnect timed out"),
            }
        }

        let Some(inner) = weak.upgrade() else {
            return;
        };
        warn!("reconnect attempts exhausted, settling into polling");
        start_polling(&inner, generation);
    });
    inner.tasks.lock().expect("task lock poisoned").reconnect = Some(handle);
}
