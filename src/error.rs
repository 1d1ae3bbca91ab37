// Errors surfaced by the public façade

use thiserror::Error;

use crate::transport::TransportError;
use tailbatch_store::StoreError;

#[derive(Debug, Error)]
pub enum BatcherError {
    /// Enqueue was called while the batcher is disabled.
    #[error("batcher is disabled")]
    Disabled,

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// An immediate request came back with a non-2xx status. Queued
    /// requests never surface this; they stay in the store for retry.
    #[error("request failed with status {status}")]
    RequestFailed { status: u16 },

    /// An immediate request failed below the HTTP layer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A supplied configuration failed validation.
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    /// The batcher has been shut down; no further work is accepted.
    #[error("batcher has shut down")]
    Shutdown,
}

impl BatcherError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}
