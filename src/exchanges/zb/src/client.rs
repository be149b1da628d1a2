use crate::config::ZbConfig;
use crate::error::{Error, Result};
use crate::orderbook::{parse_levels, to_f64};
use crate::symbol::rest_symbol;
use df_types::{CurrencyPair, OrderBookSnapshot, Ticker};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::trace;

/// Public market data endpoints. Nothing here is signed.
pub struct ZbClient {
    base_url: String,
    client: Client,
}

impl ZbClient {
    pub fn new(config: &ZbConfig) -> ZbClient {
        ZbClient {
            base_url: config.rest_url.clone(),
            client: Client::new(),
        }
    }

    pub async fn get_ticker(&self, pair: &CurrencyPair) -> Result<Ticker> {
        let content = self
            .get_request(&format!("ticker?market={}", rest_symbol(pair)))
            .await?;
        parse_ticker(pair, &content)
    }

    pub async fn get_depth(&self, size: u32, pair: &CurrencyPair) -> Result<OrderBookSnapshot> {
        let content = self
            .get_request(&format!(
                "depth?market={}&size={size}",
                rest_symbol(pair)
            ))
            .await?;
        parse_depth(pair, &content)
    }

    async fn get_request(&self, path: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?
            .error_for_status()?;

        let content = response.text().await?;
        trace!("Zb: Response content: {content}");
        Ok(content)
    }
}

pub fn parse_ticker(pair: &CurrencyPair, content: &str) -> Result<Ticker> {
    let response: Map<String, Value> = serde_json::from_str(content)?;
    let ticker = response
        .get("ticker")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Api(content.to_string()))?;

    Ok(Ticker {
        pair: pair.clone(),
        date: to_u64(response.get("date")),
        buy: to_f64(ticker.get("buy")),
        sell: to_f64(ticker.get("sell")),
        last: to_f64(ticker.get("last")),
        high: to_f64(ticker.get("high")),
        low: to_f64(ticker.get("low")),
        vol: to_f64(ticker.get("vol")),
    })
}

pub fn parse_depth(pair: &CurrencyPair, content: &str) -> Result<OrderBookSnapshot> {
    let response: Map<String, Value> = serde_json::from_str(content)?;

    let has_levels = |key: &str| response.get(key).is_some_and(Value::is_array);
    if !has_levels("asks") || !has_levels("bids") {
        return Err(Error::NoDepthData);
    }

    // Both sides keep the order of the response
    Ok(OrderBookSnapshot {
        pair: pair.clone(),
        asks: parse_levels(response.get("asks")),
        bids: parse_levels(response.get("bids")),
    })
}

fn to_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}
