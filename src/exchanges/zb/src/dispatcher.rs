use crate::codec::DepthUpdate;
use crate::orderbook;
use crate::symbol::channel_to_pair;
use df_types::DepthCallback;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{trace, warn};

#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, DepthCallback>>,
}

impl Dispatcher {
    /// Returns true if an existing callback for the channel was replaced.
    pub fn register(&self, channel: impl Into<String>, callback: DepthCallback) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.into(), callback)
            .is_some()
    }

    /// Returns false when nobody is subscribed to the update's channel.
    pub fn dispatch(&self, update: &DepthUpdate) -> bool {
        let Some(callback) = self.callback(&update.channel) else {
            trace!("Zb: No subscriber for {}", update.channel);
            return false;
        };

        let pair = channel_to_pair(&update.channel).unwrap_or_else(|e| {
            warn!("Zb: {e}, delivering with partial pair");
            e.partial
        });

        callback(orderbook::build(pair, &update.payload));
        true
    }

    fn callback(&self, channel: &str) -> Option<DepthCallback> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }
}
