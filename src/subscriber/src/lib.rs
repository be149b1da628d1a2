use df_types::{CurrencyPair, DepthCallback, DepthSubscriber, OrderBookSnapshot};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::broadcast::{channel, Receiver, Sender};
use tracing::info;

pub struct Subscriber {
    pairs: Vec<CurrencyPair>,
}

pub struct SubscriptionManager {
    orderbook_state: Receiver<Arc<OrderBookSnapshot>>,
}

impl Subscriber {
    pub fn new(pairs: Vec<CurrencyPair>) -> Subscriber {
        Subscriber { pairs }
    }

    /// Subscribes every pair and republishes their snapshots on one broadcast channel.
    pub async fn run<S: DepthSubscriber>(self, source: &S) -> Result<SubscriptionManager, S::Error> {
        let (sender, receiver) = channel(1024);

        try_join_all(self.pairs.into_iter().map(|pair| {
            info!("Subscribing to {pair}");
            source.subscribe_depth(pair, forward_to(sender.clone()))
        }))
        .await?;

        Ok(SubscriptionManager {
            orderbook_state: receiver,
        })
    }
}

impl SubscriptionManager {
    pub fn subscribe_orderbook_state(&self) -> Receiver<Arc<OrderBookSnapshot>> {
        self.orderbook_state.resubscribe()
    }
}

fn forward_to(sender: Sender<Arc<OrderBookSnapshot>>) -> DepthCallback {
    // Send only fails when every receiver is gone, the manager keeps one alive
    Arc::new(move |snapshot: OrderBookSnapshot| {
        let _ = sender.send(Arc::new(snapshot));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use df_types::DepthRecord;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        callbacks: Mutex<Vec<(CurrencyPair, DepthCallback)>>,
        refuse: bool,
    }

    #[derive(Debug)]
    struct Refused;

    impl std::fmt::Display for Refused {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("refused")
        }
    }

    impl std::error::Error for Refused {}

    #[async_trait]
    impl DepthSubscriber for FakeSource {
        type Error = Refused;

        async fn subscribe_depth(
            &self,
            pair: CurrencyPair,
            callback: DepthCallback,
        ) -> Result<(), Refused> {
            if self.refuse {
                return Err(Refused);
            }
            self.callbacks.lock().unwrap().push((pair, callback));
            Ok(())
        }
    }

    impl FakeSource {
        fn push(&self, pair: &CurrencyPair, bid: f64) {
            let callbacks = self.callbacks.lock().unwrap();
            let (_, callback) = callbacks.iter().find(|(p, _)| p == pair).unwrap();
            callback(OrderBookSnapshot {
                pair: pair.clone(),
                asks: Vec::new(),
                bids: vec![DepthRecord::new(bid, 1.0)],
            });
        }
    }

    #[tokio::test]
    async fn snapshots_from_every_pair_are_broadcast() {
        let source = FakeSource::default();
        let eth = CurrencyPair::new("eth", "qc");
        let btc = CurrencyPair::new("btc", "usdt");

        let manager = Subscriber::new(vec![eth.clone(), btc.clone()])
            .run(&source)
            .await
            .unwrap();
        let mut receiver = manager.subscribe_orderbook_state();

        source.push(&eth, 100.0);
        source.push(&btc, 200.0);

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        assert_eq!(first.pair, eth);
        assert_eq!(first.best_bid().unwrap().price, 100.0);
        assert_eq!(second.pair, btc);
    }

    #[tokio::test]
    async fn subscribe_failure_is_returned() {
        let source = FakeSource {
            refuse: true,
            ..Default::default()
        };

        let result = Subscriber::new(vec![CurrencyPair::new("eth", "qc")])
            .run(&source)
            .await;

        assert!(result.is_err());
    }
}
