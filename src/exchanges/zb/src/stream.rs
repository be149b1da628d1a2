use crate::codec::{decode_frame, encode_ping, encode_pong, encode_subscription};
use crate::codec::{DecodedMessage, DepthUpdate, SubscribeOptions};
use crate::config::ZbConfig;
use crate::connection::{ConnectionManager, ConnectionState, FrameHandler, Transport};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::symbol::pair_to_channel;
use crate::transport::WsTransport;
use async_trait::async_trait;
use df_types::{CurrencyPair, DepthCallback, DepthSubscriber};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::select;
use tokio::sync::{mpsc, watch, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Streams ZB order book snapshots over a single, lazily opened connection.
///
/// Callbacks run one at a time on a dedicated dispatch task. A slow callback delays
/// delivery for every channel, but never the socket itself: updates queue up to
/// `dispatch_buffer` and are dropped with a warning beyond that.
pub struct ZbStream {
    config: ZbConfig,
    connection: ConnectionManager,
    dispatcher: Arc<Dispatcher>,
    started: OnceCell<()>,
    shutdown: CancellationToken,
}

impl ZbStream {
    pub fn new(config: ZbConfig) -> ZbStream {
        let transport = WsTransport::new(&config.ws_url, config.reconnect_interval);
        ZbStream::with_transport(config, transport)
    }

    pub fn with_transport<T: Transport>(config: ZbConfig, transport: T) -> ZbStream {
        let connection = ConnectionManager::new(transport, config.idle_timeout);

        ZbStream {
            config,
            connection,
            dispatcher: Arc::new(Dispatcher::default()),
            started: OnceCell::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// If the subscribe message cannot be sent because the socket is reconnecting,
    /// `NotConnected` is returned and the subscription goes out once it is back.
    pub async fn subscribe_depth(&self, pair: CurrencyPair, callback: DepthCallback) -> Result<()> {
        self.start().await?;

        let channel = pair_to_channel(&pair);
        if self.dispatcher.register(channel.clone(), callback) {
            info!("Zb: Replaced depth callback for {channel}");
        }

        let message = encode_subscription(&channel, SubscribeOptions::default())?;
        self.connection.remember_subscription(&channel, message.clone());
        self.connection.send(message).await?;

        info!("Zb: Subscribed to {channel} ({pair})");
        Ok(())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Connected, but nothing has arrived for longer than `idle_timeout`.
    pub fn is_feed_stale(&self) -> bool {
        self.connection.is_stale()
    }

    pub fn shutdown(&self) {
        info!("Zb: Shutting down");
        self.shutdown.cancel();
        self.connection.close();
    }

    async fn start(&self) -> Result<()> {
        self.started
            .get_or_try_init(|| async {
                let (sender, receiver) = mpsc::channel(self.config.dispatch_buffer.max(1));
                self.connection.on_message(frame_handler(sender));
                run_dispatch(self.dispatcher.clone(), receiver, self.shutdown.clone());

                self.connection.ensure_connected().await?;
                self.connection.start_heartbeat(
                    self.config.heartbeat_interval,
                    || Ok(encode_ping(unix_seconds())?),
                    self.shutdown.clone(),
                );
                Ok::<(), Error>(())
            })
            .await?;

        Ok(())
    }
}

#[async_trait]
impl DepthSubscriber for ZbStream {
    type Error = Error;

    async fn subscribe_depth(&self, pair: CurrencyPair, callback: DepthCallback) -> Result<()> {
        ZbStream::subscribe_depth(self, pair, callback).await
    }
}

impl Drop for ZbStream {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.connection.close();
    }
}

fn frame_handler(updates: mpsc::Sender<DepthUpdate>) -> FrameHandler {
    Arc::new(move |frame: &str| {
        let messages = match decode_frame(frame) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Zb: Failed to decode frame: {e}");
                return Vec::new();
            }
        };

        let mut replies = Vec::new();
        for message in messages {
            match message {
                DecodedMessage::Ping(ping) => {
                    debug!("Zb: Received ping {ping}");
                    match encode_pong(&ping) {
                        Ok(pong) => replies.push(pong),
                        Err(e) => warn!("Zb: Failed to encode pong: {e}"),
                    }
                }
                DecodedMessage::Pong(pong) => debug!("Zb: Received pong {pong}"),
                DecodedMessage::SubscriptionAck { id } => {
                    info!("Zb: Subscription acknowledged: {id}")
                }
                DecodedMessage::Error { code, message } => {
                    warn!("Zb: Server error {code}: {message}")
                }
                DecodedMessage::OrderBookUpdate(update) => {
                    if let Err(e) = updates.try_send(update) {
                        warn!("Zb: Dropping depth update: {e}");
                    }
                }
            }
        }
        replies
    })
}

fn run_dispatch(
    dispatcher: Arc<Dispatcher>,
    mut updates: mpsc::Receiver<DepthUpdate>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            select! {
                next = updates.recv() => match next {
                    Some(update) => {
                        dispatcher.dispatch(&update);
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => break,
            }
        }
        debug!("Zb: Dispatch stopped");
    });
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
