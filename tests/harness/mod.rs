//! Test harness for engine scenarios
//!
//! `ScriptedTransport` replays a fixed sequence of outcomes in call order
//! and records every call with timestamps, so tests can assert delivery
//! order and drain serialization. The helpers wire it to an engine backed
//! by an in-memory store and a seeded device state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use tailbatch::{
    BatcherConfig, DeferredRequest, DeviceMonitor, DeviceState, NetworkBatcher, NetworkType,
    OutboundRequest, PriorityHint, RequestStore, Transport, TransportError, TransportResponse,
};

#[derive(Clone)]
pub enum Outcome {
    Status(u16),
    Error(String),
}

#[derive(Clone)]
pub struct CallRecord {
    pub url: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Replays a script of outcomes in call order, then falls back to a
/// default outcome.
pub struct ScriptedTransport {
    script: Mutex<Vec<Outcome>>,
    default: Outcome,
    delay: Option<Duration>,
    calls: Mutex<Vec<CallRecord>>,
}

impl ScriptedTransport {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Vec::new()),
            default: Outcome::Status(200),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Vec::new()),
            default: Outcome::Error(message.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn scripted(outcomes: Vec<Outcome>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes),
            default: Outcome::Status(200),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Vec::new()),
            default: Outcome::Status(200),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &DeferredRequest,
    ) -> Result<TransportResponse, TransportError> {
        let started = Instant::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = {
            let mut script = self.script.lock();
            if script.is_empty() {
                self.default.clone()
            } else {
                script.remove(0)
            }
        };
        self.calls.lock().push(CallRecord {
            url: request.url.clone(),
            started,
            finished: Instant::now(),
        });
        match outcome {
            Outcome::Status(status) => Ok(TransportResponse::new(status)),
            Outcome::Error(message) => Err(TransportError::new(message)),
        }
    }
}

pub fn monitor_with(
    network_type: NetworkType,
    is_connected: bool,
    is_charging: bool,
) -> Arc<DeviceMonitor> {
    DeviceMonitor::with_state(DeviceState {
        network_type,
        is_connected,
        is_charging,
        battery_level: 0.8,
        last_user_network_activity: None,
    })
}

/// Connected on an unremarkable link: policy holds deferrable traffic.
pub fn holding_monitor() -> Arc<DeviceMonitor> {
    monitor_with(NetworkType::Other, true, false)
}

/// Opt-in scheduler narration while debugging: TAILBATCH_TEST_LOG=1.
fn init_test_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if std::env::var("TAILBATCH_TEST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::DEBUG)
                .init();
        }
    });
}

pub fn engine(
    transport: Arc<ScriptedTransport>,
    config: BatcherConfig,
    monitor: Arc<DeviceMonitor>,
) -> NetworkBatcher {
    init_test_logging();
    NetworkBatcher::builder(transport)
        .config(config)
        .store(RequestStore::in_memory().unwrap())
        .monitor(monitor)
        .build()
        .unwrap()
}

pub fn epoch() -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(1)
}

pub fn deferrable(url: &str) -> OutboundRequest {
    OutboundRequest::new(url)
        .method("POST")
        .priority(PriorityHint::Deferrable)
}

pub async fn wait_for_queue_len(batcher: &NetworkBatcher, expected: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let stats = batcher.statistics(epoch()).await.unwrap();
        if stats.queued_requests == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "queue stuck at {} (want {})",
            stats.queued_requests,
            expected
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
