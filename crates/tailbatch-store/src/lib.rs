// tailbatch-store - crash-safe persistence for deferred requests
//
// A priority-ordered durable queue plus an append-only transmission log,
// backed by SQLite in WAL mode. Every save, delete, and log append is
// durable before the call returns. The connection lives on a dedicated
// writer thread; the async handle talks to it over a command channel, so
// the single-writer invariant holds without async locking.

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use tailbatch_core::{DeferredRequest, RequestId};
use tokio::sync::oneshot;

mod error;
mod records;
mod worker;

pub use error::{Result, StoreError};
pub use records::{TransmissionRecord, TransmissionStats};

use worker::Command;

/// Handle to the durable request store. Cheap to clone; all clones share
/// one writer thread.
#[derive(Clone)]
pub struct RequestStore {
    inner: Arc<Inner>,
}

struct Inner {
    tx: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RequestStore {
    /// Open the store at `<directory>/NetworkBatcher/<identifier>.sqlite`,
    /// creating the directory if needed.
    pub fn open(directory: impl Into<PathBuf>, identifier: &str) -> Result<Self> {
        let dir = directory.into().join("NetworkBatcher");
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
        Self::open_at(dir.join(format!("{identifier}.sqlite")))
    }

    /// Open a store at an explicit database file path.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::start(Connection::open(path.into())?)
    }

    /// Fully in-memory store; contents vanish when it closes.
    pub fn in_memory() -> Result<Self> {
        Self::start(Connection::open_in_memory()?)
    }

    fn start(conn: Connection) -> Result<Self> {
        worker::init_schema(&conn)?;
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("tailbatch-store".into())
            .spawn(move || worker::run(conn, rx))
            .map_err(|source| StoreError::WorkerSpawn { source })?;
        Ok(Self {
            inner: Arc::new(Inner {
                tx,
                worker: Mutex::new(Some(handle)),
            }),
        })
    }

    async fn call<T>(&self, make: impl FnOnce(worker::Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.inner
            .tx
            .send(make(reply))
            .map_err(|_| StoreError::WorkerGone)?;
        rx.await.map_err(|_| StoreError::WorkerGone)?
    }

    /// Upsert a request by id.
    pub async fn save(&self, request: DeferredRequest) -> Result<()> {
        self.call(|reply| Command::Save(request, reply)).await
    }

    /// Up to `limit` pending requests, most urgent and oldest first.
    pub async fn fetch_batch(&self, limit: usize) -> Result<Vec<DeferredRequest>> {
        self.call(|reply| Command::FetchBatch(limit, reply)).await
    }

    /// Remove a set of requests in one atomic operation. Missing ids are
    /// ignored.
    pub async fn delete(&self, ids: Vec<RequestId>) -> Result<()> {
        self.call(|reply| Command::Delete(ids, reply)).await
    }

    /// Remove every request whose deadline has passed; returns how many.
    pub async fn delete_expired(&self) -> Result<u64> {
        self.call(Command::DeleteExpired).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.call(Command::Count).await
    }

    pub async fn total_payload_size(&self) -> Result<u64> {
        self.call(Command::TotalPayloadSize).await
    }

    /// Remove all pending requests. The transmission log is untouched.
    pub async fn clear(&self) -> Result<()> {
        self.call(Command::Clear).await
    }

    pub async fn log_transmission(&self, record: TransmissionRecord) -> Result<()> {
        self.call(|reply| Command::LogTransmission(record, reply))
            .await
    }

    pub async fn transmission_stats(&self, since: DateTime<Utc>) -> Result<TransmissionStats> {
        self.call(|reply| Command::TransmissionStats(since, reply))
            .await
    }

    /// Drop transmission-log rows older than the given instant; returns
    /// how many were pruned.
    pub async fn prune_transmission_log(&self, older_than: DateTime<Utc>) -> Result<u64> {
        self.call(|reply| Command::PruneLog(older_than, reply))
            .await
    }

    /// Stop the writer thread. Pending commands already queued are served
    /// first; later calls on any clone fail with `WorkerGone`.
    pub async fn close(&self) -> Result<()> {
        self.call(Command::Close).await?;
        let handle = self.inner.worker.lock().take();
        if let Some(handle) = handle {
            // The worker has already replied and is exiting; this join is
            // effectively immediate.
            let _ = handle.join();
        }
        Ok(())
    }
}
