use crate::connection::{Transport, TransportEvents, TransportSink};
use async_trait::async_trait;
use ezsockets::client::ClientCloseMode;
use ezsockets::{ClientConfig, ClientExt, CloseFrame, Error, WSError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, trace, warn};

/// WebSocket transport backed by an ezsockets client, which reconnects on its own
/// every `reconnect_interval` for as long as the process runs.
pub struct WsTransport {
    url: String,
    reconnect_interval: Duration,
}

impl WsTransport {
    pub fn new(url: &str, reconnect_interval: Duration) -> WsTransport {
        WsTransport {
            url: url.to_string(),
            reconnect_interval,
        }
    }
}

struct WebSocketClient {
    events: TransportEvents,
    // Resolved by the first connect attempt only
    ready: Option<oneshot::Sender<Result<(), String>>>,
}

struct WsSink {
    handle: ezsockets::Client<WebSocketClient>,
}

#[async_trait]
impl ClientExt for WebSocketClient {
    type Call = ();

    async fn on_text(&mut self, text: String) -> Result<(), Error> {
        trace!("Zb: Received text: {text}");
        self.events.frame(&text).await;
        Ok(())
    }

    async fn on_binary(&mut self, bytes: Vec<u8>) -> Result<(), Error> {
        match String::from_utf8(bytes) {
            Ok(text) => self.events.frame(&text).await,
            Err(e) => warn!("Zb: Dropping binary frame: {e}"),
        }
        Ok(())
    }

    async fn on_call(&mut self, _: Self::Call) -> Result<(), Error> {
        Ok(())
    }

    async fn on_connect(&mut self) -> Result<(), Error> {
        info!("Zb: Connected");
        self.events.connected().await;
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Ok(()));
        }
        Ok(())
    }

    async fn on_connect_fail(&mut self, error: WSError) -> Result<ClientCloseMode, Error> {
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(Err(error.to_string()));
            return Ok(ClientCloseMode::Close);
        }

        warn!("Zb: Failed to reconnect: {error:?}");
        Ok(ClientCloseMode::Reconnect)
    }

    async fn on_close(&mut self, frame: Option<CloseFrame>) -> Result<ClientCloseMode, Error> {
        info!("Zb: Closed by server: {frame:?}");
        self.events.disconnected();
        Ok(ClientCloseMode::Reconnect)
    }

    async fn on_disconnect(&mut self) -> Result<ClientCloseMode, Error> {
        info!("Zb: Disconnected");
        self.events.disconnected();
        Ok(ClientCloseMode::Reconnect)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, events: TransportEvents) -> crate::Result<Box<dyn TransportSink>> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let config =
            ClientConfig::new(self.url.as_str()).reconnect_interval(self.reconnect_interval);

        let (handle, future) = ezsockets::connect(
            |_| WebSocketClient {
                events,
                ready: Some(ready_tx),
            },
            config,
        )
        .await;

        tokio::spawn(async move {
            if let Err(e) = future.await {
                error!("Zb: Connection stopped: {e}");
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(Box::new(WsSink { handle })),
            Ok(Err(e)) => Err(crate::Error::Transport(e)),
            Err(_) => Err(crate::Error::Transport(
                "connection closed before handshake".to_string(),
            )),
        }
    }
}

impl TransportSink for WsSink {
    fn send_text(&self, text: String) -> crate::Result<()> {
        self.handle
            .text(text)
            .map(|_| ())
            .map_err(|e| crate::Error::Transport(e.to_string()))
    }

    fn close(&self) {
        if let Err(e) = self.handle.close(None) {
            warn!("Zb: Failed to close connection: {e}");
        }
    }
}
