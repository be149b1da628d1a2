use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use df_exchanges_zb::{Error, Result, Transport, TransportEvents, TransportSink};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct FakeTransport {
    refuse: bool,
    opens: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
    events: Arc<Mutex<Option<TransportEvents>>>,
}

struct FakeSink {
    sent: Arc<Mutex<Vec<String>>>,
}

impl TransportSink for FakeSink {
    fn send_text(&self, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self) {}
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, events: TransportEvents) -> Result<Box<dyn TransportSink>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;

        if self.refuse {
            return Err(Error::Transport("connection refused".to_string()));
        }

        events.connected().await;
        *self.events.lock().unwrap() = Some(events);
        Ok(Box::new(FakeSink {
            sent: self.sent.clone(),
        }))
    }
}

impl FakeTransport {
    pub fn refusing() -> FakeTransport {
        FakeTransport {
            refuse: true,
            ..Default::default()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> TransportEvents {
        self.events.lock().unwrap().clone().unwrap()
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }
}

/// Wraps a JSON array the way the exchange does: extra brackets, gzip, base64.
pub fn data_frame(json_array: &str) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(format!("[{json_array}]").as_bytes())
        .unwrap();
    STANDARD.encode(encoder.finish().unwrap())
}
