//! In-process, energy-aware batching for non-urgent outbound HTTP
//! requests.
//!
//! Every radio wake-up on a mobile-class device drags a multi-second
//! "tail" of powered-up idle time behind it, whatever the payload size.
//! tailbatch amortizes that cost: callers hand over fire-and-forget
//! requests (analytics, telemetry, crash reports, attribution pings),
//! the engine persists them in a crash-safe queue, and a scheduler
//! drains the queue in host-grouped batches when the device is on WiFi,
//! charging, inside a warm-radio window, or when queue or deadline
//! pressure forces its hand.
//!
//! The HTTP client stays with the host: implement [`Transport`] over
//! whatever stack the app already uses, and the engine replays each
//! request's `(url, method, headers, body)` through it verbatim.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tailbatch::{
//!     DeferredRequest, NetworkBatcher, OutboundRequest, Transport, TransportError,
//!     TransportResponse,
//! };
//!
//! struct HostClient;
//!
//! #[async_trait::async_trait]
//! impl Transport for HostClient {
//!     async fn send(
//!         &self,
//!         request: &DeferredRequest,
//!     ) -> Result<TransportResponse, TransportError> {
//!         // hand off to the host HTTP stack
//!         # let _ = request;
//!         Ok(TransportResponse::new(200))
//!     }
//! }
//!
//! # async fn run() -> Result<(), tailbatch::BatcherError> {
//! let batcher = NetworkBatcher::builder(Arc::new(HostClient))
//!     .identifier("analytics")
//!     .build()?;
//! batcher
//!     .enqueue(
//!         OutboundRequest::new("https://telemetry.example.com/v1/events")
//!             .method("POST")
//!             .body(b"{\"event\":\"launch\"}".to_vec()),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod batcher;
mod error;
mod monitor;
mod scheduler;
mod stats;
mod transmitter;
mod transport;

pub use batcher::{NetworkBatcher, NetworkBatcherBuilder};
pub use error::BatcherError;
pub use monitor::{DeviceMonitor, PlatformEvent};
pub use stats::BatcherStatistics;
pub use transport::{Transport, TransportError, TransportResponse};

pub use tailbatch_config::{BatcherConfig, Preset};
pub use tailbatch_core::{
    DeferredRequest, DeviceState, DomainClassifier, NetworkType, OutboundRequest, Priority,
    PriorityHint, RequestId,
};
pub use tailbatch_store::{RequestStore, StoreError, TransmissionRecord, TransmissionStats};
