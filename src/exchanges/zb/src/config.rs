use crate::error::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

pub const WS_URL: &str = "wss://kline.zb.cn/websocket";
pub const REST_URL: &str = "http://api.zb.com/data/v1/";

#[derive(Clone, Debug)]
pub struct ZbConfig {
    pub ws_url: String,
    pub rest_url: String,
    pub heartbeat_interval: Duration,
    pub reconnect_interval: Duration,
    /// Heartbeats warn when nothing was received for this long.
    pub idle_timeout: Duration,
    /// Capacity of the queue between the socket and the subscriber callbacks.
    pub dispatch_buffer: usize,
}

impl Default for ZbConfig {
    fn default() -> Self {
        ZbConfig {
            ws_url: WS_URL.to_string(),
            rest_url: REST_URL.to_string(),
            heartbeat_interval: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            dispatch_buffer: 1024,
        }
    }
}

impl ZbConfig {
    pub fn from_env() -> Result<ZbConfig> {
        ZbConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<ZbConfig> {
        let defaults = ZbConfig::default();

        Ok(ZbConfig {
            ws_url: lookup("ZB_WS_URL").unwrap_or(defaults.ws_url),
            rest_url: lookup("ZB_REST_URL").unwrap_or(defaults.rest_url),
            heartbeat_interval: seconds(&lookup, "ZB_HEARTBEAT_SECS")?
                .unwrap_or(defaults.heartbeat_interval),
            reconnect_interval: seconds(&lookup, "ZB_RECONNECT_SECS")?
                .unwrap_or(defaults.reconnect_interval),
            idle_timeout: seconds(&lookup, "ZB_IDLE_TIMEOUT_SECS")?
                .unwrap_or(defaults.idle_timeout),
            dispatch_buffer: positive(&lookup, "ZB_DISPATCH_BUFFER")?
                .unwrap_or(defaults.dispatch_buffer),
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<Duration>> {
    Ok(positive::<u64>(lookup, key)?.map(Duration::from_secs))
}

fn positive<T: FromStr + Default + PartialOrd>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };

    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(Some(parsed)),
        _ => Err(Error::Config { key, value }),
    }
}
