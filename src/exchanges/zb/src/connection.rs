use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::select;
use tokio::sync::{watch, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Handles one inbound frame and returns the frames to write back, e.g. heartbeat pongs.
pub type FrameHandler = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens the socket and resolves once the first handshake has completed, after
    /// firing [`TransportEvents::connected`]. Reconnecting after later disconnects is
    /// the transport's job, reported through the same events.
    async fn open(&self, events: TransportEvents) -> Result<Box<dyn TransportSink>>;
}

pub trait TransportSink: Send + Sync {
    fn send_text(&self, text: String) -> Result<()>;

    fn close(&self);
}

#[derive(Clone)]
pub struct TransportEvents {
    shared: Arc<Shared>,
}

impl TransportEvents {
    pub async fn connected(&self) {
        self.shared.on_connected().await;
    }

    pub fn disconnected(&self) {
        self.shared.on_disconnected();
    }

    pub async fn frame(&self, text: &str) {
        self.shared.on_frame(text).await;
    }
}

/// Owns the single socket of a stream client. Cloning shares the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    idle_timeout: Duration,
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    sink: OnceCell<Box<dyn TransportSink>>,
    send_lock: Mutex<()>,
    last_activity: StdMutex<Instant>,
    // inbound frames only, heartbeats and other sends do not count
    last_received: StdMutex<Instant>,
    handler: RwLock<Option<FrameHandler>>,
    // channel -> encoded subscribe message, replayed after every reconnect
    subscriptions: StdMutex<BTreeMap<String, String>>,
    connects: AtomicUsize,
}

impl ConnectionManager {
    pub fn new<T: Transport>(transport: T, idle_timeout: Duration) -> ConnectionManager {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        ConnectionManager {
            shared: Arc::new(Shared {
                state,
                sink: OnceCell::new(),
                send_lock: Mutex::new(()),
                last_activity: StdMutex::new(Instant::now()),
                last_received: StdMutex::new(Instant::now()),
                handler: RwLock::new(None),
                subscriptions: StdMutex::new(BTreeMap::new()),
                connects: AtomicUsize::new(0),
            }),
            transport: Arc::new(transport),
            idle_timeout,
        }
    }

    /// Opens the connection the first time it is called. Concurrent callers share the
    /// same attempt. A failed handshake is returned as is and the next call tries again.
    pub async fn ensure_connected(&self) -> Result<()> {
        self.shared
            .sink
            .get_or_try_init(|| async {
                self.shared.set_state(ConnectionState::Connecting);
                let events = TransportEvents {
                    shared: self.shared.clone(),
                };

                match self.transport.open(events).await {
                    Ok(sink) => {
                        info!("Zb: Connection established");
                        Ok(sink)
                    }
                    Err(e) => {
                        error!("Zb: Failed to connect: {e}");
                        self.shared.set_state(ConnectionState::Disconnected);
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(())
    }

    /// Installs the handler for inbound frames, returning the one it replaces.
    pub fn on_message(&self, handler: FrameHandler) -> Option<FrameHandler> {
        self.shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handler)
    }

    /// Fails with [`Error::NotConnected`] instead of queueing while the socket is down.
    pub async fn send(&self, text: String) -> Result<()> {
        self.shared.send(text).await
    }

    /// Records a subscribe message so it is sent again whenever the socket reconnects.
    pub fn remember_subscription(&self, channel: &str, message: String) {
        self.shared
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string(), message);
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn last_activity(&self) -> Instant {
        self.shared.last_activity()
    }

    pub fn last_received(&self) -> Instant {
        self.shared.last_received()
    }

    /// True while connected and nothing has arrived from the exchange for longer than
    /// the idle timeout.
    pub fn is_stale(&self) -> bool {
        self.shared.is_stale(self.idle_timeout)
    }

    pub fn start_heartbeat<F>(
        &self,
        interval: Duration,
        ping_builder: F,
        shutdown: CancellationToken,
    ) -> JoinHandle<()>
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        let shared = self.shared.clone();
        let idle_timeout = self.idle_timeout;
        let interval = interval.max(MIN_HEARTBEAT_INTERVAL);

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                select! {
                    _ = ticker.tick() => (),
                    _ = shutdown.cancelled() => break,
                }

                if !shared.is_connected() {
                    debug!("Zb: Skipping heartbeat while disconnected");
                    continue;
                }

                if shared.is_stale(idle_timeout) {
                    let idle = shared.last_received().elapsed();
                    warn!("Zb: Nothing received for {idle:?}, feed may be stale");
                }

                let result = match ping_builder() {
                    Ok(ping) => shared.send(ping).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => debug!("Zb: Heartbeat sent"),
                    Err(e) => warn!("Zb: Heartbeat failed: {e}"),
                }
            }

            debug!("Zb: Heartbeat stopped");
        })
    }

    pub fn close(&self) {
        if let Some(sink) = self.shared.sink.get() {
            sink.close();
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl Shared {
    async fn send(&self, text: String) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let sink = self.sink.get().ok_or(Error::NotConnected)?;

        let _guard = self.send_lock.lock().await;
        trace!("Zb: Sending message: {text}");
        sink.send_text(text)?;
        self.touch();
        Ok(())
    }

    async fn on_connected(&self) {
        let connects = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Connected);
        self.touch();
        self.mark_received();

        if connects == 1 {
            return;
        }

        let messages: Vec<String> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        info!("Zb: Reconnected, replaying {} subscriptions", messages.len());
        for message in messages {
            if let Err(e) = self.send(message).await {
                warn!("Zb: Failed to replay subscription: {e}");
            }
        }
    }

    fn on_disconnected(&self) {
        self.set_state(ConnectionState::Disconnected);
    }

    async fn on_frame(&self, text: &str) {
        self.touch();
        self.mark_received();

        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(handler) = handler else {
            debug!("Zb: No frame handler installed, dropping frame");
            return;
        };

        for reply in handler(text) {
            if let Err(e) = self.send(reply).await {
                warn!("Zb: Failed to send reply: {e}");
            }
        }
    }

    fn is_connected(&self) -> bool {
        *self.state.borrow() == ConnectionState::Connected
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Zb: Connection state {previous:?} -> {state:?}");
        }
    }

    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_received(&self) {
        *self
            .last_received
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn last_received(&self) -> Instant {
        *self
            .last_received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self, idle_timeout: Duration) -> bool {
        self.is_connected() && self.last_received().elapsed() > idle_timeout
    }
}
