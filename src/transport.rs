// Pluggable HTTP transport seam
//
// The batcher never speaks HTTP itself; the host injects a transport and
// the engine replays (url, method, headers, body) through it verbatim.

use async_trait::async_trait;

use tailbatch_core::DeferredRequest;

/// The slice of an HTTP response the batcher cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    /// Any 2xx counts as delivered.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP layer: connectivity, DNS, timeout.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Maps a request record to a response or a transport-level error.
///
/// Timeouts and connection management are the transport's own concern; the
/// engine imposes no additional deadlines. Implementations must be safe to
/// call from multiple tasks at once - the transmitter fans out across
/// hosts.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &DeferredRequest)
        -> Result<TransportResponse, TransportError>;
}
