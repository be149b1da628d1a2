use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Invoked with every snapshot received for a subscribed pair.
pub type DepthCallback = Arc<dyn Fn(OrderBookSnapshot) + Send + Sync>;

/// Anything that can stream order book snapshots for a currency pair.
#[async_trait]
pub trait DepthSubscriber: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn subscribe_depth(
        &self,
        pair: CurrencyPair,
        callback: DepthCallback,
    ) -> Result<(), Self::Error>;
}

#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    symbol: String,
}

impl Currency {
    pub fn new(symbol: &str) -> Currency {
        Currency {
            symbol: symbol.trim().to_uppercase(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_empty(&self) -> bool {
        self.symbol.is_empty()
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.symbol)
    }
}

#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> CurrencyPair {
        CurrencyPair {
            base: Currency::new(base),
            quote: Currency::new(quote),
        }
    }

    pub fn to_symbol(&self, separator: &str) -> String {
        format!("{}{separator}{}", self.base, self.quote)
    }

    /// False for pairs recovered from a channel name whose quote could not be identified.
    pub fn is_complete(&self) -> bool {
        !self.base.is_empty() && !self.quote.is_empty()
    }

    pub fn adapt_usd_to_usdt(&self) -> CurrencyPair {
        self.map_currencies(|c| if c.symbol == "USD" { Currency::new("USDT") } else { c.clone() })
    }

    pub fn adapt_bch_to_bcc(&self) -> CurrencyPair {
        self.map_currencies(|c| if c.symbol == "BCH" { Currency::new("BCC") } else { c.clone() })
    }

    fn map_currencies(&self, f: impl Fn(&Currency) -> Currency) -> CurrencyPair {
        CurrencyPair {
            base: f(&self.base),
            quote: f(&self.quote),
        }
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once(['_', '-', '/'])
            .ok_or_else(|| format!("Invalid currency pair: {s}"))?;

        let pair = CurrencyPair::new(base, quote);
        if pair.is_complete() {
            Ok(pair)
        } else {
            Err(format!("Invalid currency pair: {s}"))
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthRecord {
    pub price: f64,
    pub amount: f64,
}

impl DepthRecord {
    pub fn new(price: f64, amount: f64) -> DepthRecord {
        DepthRecord { price, amount }
    }
}

/// A full replacement view of one pair's book. Asks keep the order the exchange sent
/// them in. Streamed bids are ordered best (highest) first, REST depth keeps the
/// response order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub pair: CurrencyPair,
    pub asks: Vec<DepthRecord>,
    pub bids: Vec<DepthRecord>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<&DepthRecord> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthRecord> {
        self.asks.first()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: CurrencyPair,
    pub date: u64,
    pub buy: f64,
    pub sell: f64,
    pub last: f64,
    pub high: f64,
    pub low: f64,
    pub vol: f64,
}
