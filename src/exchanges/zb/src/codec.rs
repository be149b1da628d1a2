use crate::error::DecodeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::bufread::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Read;
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub enum DecodedMessage {
    /// Must be answered with a pong carrying the same value.
    Ping(Value),
    Pong(Value),
    SubscriptionAck { id: String },
    Error { code: i64, message: String },
    OrderBookUpdate(DepthUpdate),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DepthUpdate {
    pub channel: String,
    pub payload: Map<String, Value>,
}

#[derive(Clone, Copy, Debug)]
pub struct SubscribeOptions {
    pub binary: bool,
    pub zip: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        SubscribeOptions {
            binary: true,
            zip: true,
        }
    }
}

/// Data frames are base64 text wrapping gzip bytes, which inflate to a JSON array of
/// objects inside one extra pair of brackets. Control errors arrive as plain JSON.
pub fn decode_frame(raw: &str) -> Result<Vec<DecodedMessage>, DecodeError> {
    if let Some(error) = control_error(raw) {
        return Ok(vec![error]);
    }

    let compressed = STANDARD.decode(raw.trim())?;
    let mut inflated = Vec::new();
    GzDecoder::new(compressed.as_slice()).read_to_end(&mut inflated)?;

    if inflated.len() < 2 {
        return Err(DecodeError::Truncated(inflated.len()));
    }

    let objects: Vec<Map<String, Value>> =
        serde_json::from_slice(&inflated[1..inflated.len() - 1])?;

    Ok(objects
        .into_iter()
        .filter_map(|object| match classify(object) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Zb: Dropping message: {e}");
                None
            }
        })
        .collect())
}

pub fn classify(object: Map<String, Value>) -> Result<DecodedMessage, DecodeError> {
    if let Some(ping) = field(&object, "ping") {
        return Ok(DecodedMessage::Ping(ping.clone()));
    }
    if let Some(pong) = field(&object, "pong") {
        return Ok(DecodedMessage::Pong(pong.clone()));
    }

    let channel = object
        .get("channel")
        .and_then(Value::as_str)
        .map(str::to_string);

    let id = field(&object, "id").map(value_to_string);

    match (channel, id) {
        (Some(channel), _) => Ok(DecodedMessage::OrderBookUpdate(DepthUpdate {
            channel,
            payload: object,
        })),
        (None, Some(id)) => Ok(DecodedMessage::SubscriptionAck { id }),
        (None, None) => Err(DecodeError::Unrecognized(Value::Object(object).to_string())),
    }
}

pub fn encode_subscription(
    channel: &str,
    options: SubscribeOptions,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Subscribe {
        binary: options.binary.to_string(),
        channel: channel.to_string(),
        event: "addChannel".to_string(),
        is_zip: options.zip.to_string(),
    })
}

pub fn encode_ping(unix_seconds: i64) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Ping { ping: unix_seconds })
}

pub fn encode_pong(ping: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Pong { pong: ping.clone() })
}

fn control_error(raw: &str) -> Option<DecodedMessage> {
    if !raw.trim_start().starts_with('{') {
        return None;
    }

    let object: Map<String, Value> = serde_json::from_str(raw).ok()?;
    let code = field(&object, "code")?;
    let code = match code {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .unwrap_or_default();

    let message = field(&object, "message")
        .or_else(|| field(&object, "msg"))
        .map(value_to_string)
        .unwrap_or_else(|| raw.to_string());

    Some(DecodedMessage::Error { code, message })
}

fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Serialize, Deserialize)]
struct Subscribe {
    binary: String,
    channel: String,
    event: String,
    #[serde(rename = "isZip")]
    is_zip: String,
}

#[derive(Serialize, Deserialize)]
struct Ping {
    ping: i64,
}

#[derive(Serialize, Deserialize)]
struct Pong {
    pong: Value,
}
