use df_types::CurrencyPair;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not connected")]
    NotConnected,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No depth data in response")]
    NoDepthData,

    #[error("Unexpected response: {0}")]
    Api(String),

    #[error("Invalid value for {key}: {value}")]
    Config { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Failed to inflate frame: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("Inflated frame too short: {0} bytes")]
    Truncated(usize),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized message: {0}")]
    Unrecognized(String),
}

/// The channel's quote currency is not one of the known suffixes. `partial` holds
/// the whole symbol as base and an empty quote.
#[derive(Debug, Error)]
#[error("No known quote currency in channel {channel}")]
pub struct ChannelTranslationError {
    pub channel: String,
    pub partial: CurrencyPair,
}

pub type Result<T> = std::result::Result<T, Error>;
