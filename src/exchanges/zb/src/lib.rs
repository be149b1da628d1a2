mod client;
pub mod codec;
mod config;
pub mod connection;
pub mod dispatcher;
mod error;
pub mod orderbook;
mod stream;
pub mod symbol;
mod transport;

pub use client::{parse_depth, parse_ticker, ZbClient};
pub use config::{ZbConfig, REST_URL, WS_URL};
pub use connection::{ConnectionManager, ConnectionState, Transport, TransportEvents, TransportSink};
pub use error::{ChannelTranslationError, DecodeError, Error, Result};
pub use stream::ZbStream;
pub use transport::WsTransport;
