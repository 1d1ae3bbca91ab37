//! Error types for the durable request store

use thiserror::Error;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("header encoding failed: {0}")]
    HeaderCodec(#[from] serde_json::Error),

    /// A persisted row no longer decodes; the database was modified or
    /// damaged outside the store.
    #[error("corrupt row {id}: {message}")]
    Corrupt { id: String, message: String },

    #[error("could not create store directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not spawn store worker: {source}")]
    WorkerSpawn {
        #[source]
        source: std::io::Error,
    },

    /// The writer thread has stopped (store closed or panicked).
    #[error("store worker is no longer running")]
    WorkerGone,
}

impl StoreError {
    pub(crate) fn corrupt(id: &str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            id: id.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
