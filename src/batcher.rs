// Public façade
//
// `NetworkBatcher` wires the store, monitor, transmitter, and scheduler
// together and is the only surface callers touch. Immediate requests skip
// the queue entirely; everything else is persisted first and drained by
// the scheduler.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use tailbatch_config::BatcherConfig;
use tailbatch_core::{host_of, DeferredRequest, DomainClassifier, OutboundRequest, Priority, RequestId};
use tailbatch_store::{RequestStore, StoreError};

use crate::error::BatcherError;
use crate::monitor::DeviceMonitor;
use crate::scheduler::{DrainTrigger, Scheduler};
use crate::stats::BatcherStatistics;
use crate::transmitter::Transmitter;
use crate::transport::Transport;

static SHARED: OnceCell<NetworkBatcher> = OnceCell::new();

/// The batching engine façade. Cheap to clone; clones share one engine.
#[derive(Clone)]
pub struct NetworkBatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<RwLock<BatcherConfig>>,
    classifier: RwLock<DomainClassifier>,
    store: RequestStore,
    monitor: Arc<DeviceMonitor>,
    transport: Arc<dyn Transport>,
    enabled: Arc<AtomicBool>,
    triggers: mpsc::UnboundedSender<DrainTrigger>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for constructor-based instances. Multi-tenant hosts create one
/// per identifier; most apps use one instance, optionally installed as
/// the process-wide shared one.
pub struct NetworkBatcherBuilder {
    transport: Arc<dyn Transport>,
    config: BatcherConfig,
    identifier: String,
    data_dir: Option<PathBuf>,
    store: Option<RequestStore>,
    monitor: Option<Arc<DeviceMonitor>>,
}

impl NetworkBatcherBuilder {
    pub fn config(mut self, config: BatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Names the backing database file: `<data_dir>/NetworkBatcher/<id>.sqlite`.
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Use an already-open store instead of opening one from
    /// `data_dir`/`identifier`.
    pub fn store(mut self, store: RequestStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn monitor(mut self, monitor: Arc<DeviceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Build and start the engine. Must be called within a Tokio runtime;
    /// the scheduler task is spawned here.
    pub fn build(self) -> Result<NetworkBatcher, BatcherError> {
        self.config
            .validate()
            .map_err(|err| BatcherError::Configuration {
                message: err.to_string(),
            })?;

        let store = match self.store {
            Some(store) => store,
            None => {
                let dir = self
                    .data_dir
                    .or_else(dirs::data_local_dir)
                    .unwrap_or_else(std::env::temp_dir);
                RequestStore::open(dir, &self.identifier)?
            }
        };
        let monitor = self.monitor.unwrap_or_else(DeviceMonitor::new);
        let classifier = DomainClassifier::new(
            &self.config.immediate_domains,
            &self.config.deferrable_domains,
        );
        let config = Arc::new(RwLock::new(self.config));
        let enabled = Arc::new(AtomicBool::new(true));

        let (triggers, inbox) = mpsc::unbounded_channel();
        let transmitter = Transmitter::new(Arc::clone(&self.transport), store.clone());
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::clone(&monitor),
            transmitter,
            Arc::clone(&config),
            Arc::clone(&enabled),
            inbox,
            triggers.clone(),
        );
        let handle = tokio::spawn(scheduler.run());

        Ok(NetworkBatcher {
            inner: Arc::new(Inner {
                config,
                classifier: RwLock::new(classifier),
                store,
                monitor,
                transport: self.transport,
                enabled,
                triggers,
                scheduler: Mutex::new(Some(handle)),
            }),
        })
    }
}

impl NetworkBatcher {
    pub fn builder(transport: Arc<dyn Transport>) -> NetworkBatcherBuilder {
        NetworkBatcherBuilder {
            transport,
            config: BatcherConfig::default(),
            identifier: "default".to_string(),
            data_dir: None,
            store: None,
            monitor: None,
        }
    }

    /// Install a process-wide shared instance; fails with the instance
    /// handed back if one is already installed.
    pub fn install_shared(batcher: NetworkBatcher) -> Result<(), NetworkBatcher> {
        SHARED.set(batcher)
    }

    /// The process-wide shared instance, if one has been installed.
    pub fn shared() -> Option<&'static NetworkBatcher> {
        SHARED.get()
    }

    /// Hand a request to the batcher.
    ///
    /// `Auto` priority is resolved by the domain classifier. An
    /// `immediate` request goes straight to the transport; its returned
    /// id is freshly generated and untracked (it cannot be used for any
    /// later lookup). Everything else is persisted durably before this
    /// returns, and a drain is considered.
    pub async fn enqueue(&self, request: OutboundRequest) -> Result<RequestId, BatcherError> {
        if !self.inner.enabled.load(Ordering::Acquire) {
            return Err(BatcherError::Disabled);
        }
        let Some(domain) = host_of(&request.url) else {
            return Err(BatcherError::invalid(format!(
                "URL has no host: {}",
                request.url
            )));
        };
        let priority = match request.priority.explicit() {
            Some(priority) => priority,
            None => self.inner.classifier.read().classify_host(&domain),
        };
        let default_deferral = self.inner.config.read().max_deferral();
        let deferred = DeferredRequest::from_outbound(request, priority, default_deferral);

        if priority == Priority::Immediate {
            let response = self.inner.transport.send(&deferred).await?;
            if !response.is_success() {
                return Err(BatcherError::RequestFailed {
                    status: response.status,
                });
            }
            // The radio is warm now; queued work can ride along.
            self.inner.monitor.record_user_network_activity();
            self.post(DrainTrigger::Enqueued);
            return Ok(deferred.id);
        }

        self.inner.store.save(deferred.clone()).await?;
        debug!(id = %deferred.id, priority = %deferred.priority, host = %domain, "request queued");
        self.post(DrainTrigger::Enqueued);
        Ok(deferred.id)
    }

    /// Force a drain regardless of policy and batch interval. Resolves
    /// when the drain completes; concurrent flushes coalesce. Abandoning
    /// the returned future does not cancel the drain.
    pub async fn flush(&self, reason: impl Into<String>) -> Result<(), BatcherError> {
        let (done, wait) = oneshot::channel();
        self.inner
            .triggers
            .send(DrainTrigger::Flush {
                reason: reason.into(),
                done,
            })
            .map_err(|_| BatcherError::Shutdown)?;
        wait.await.map_err(|_| BatcherError::Shutdown)
    }

    /// Disabling rejects new enqueues and stops triggers from starting
    /// drains; an in-flight drain always runs to completion.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.inner.enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            info!(enabled, "batcher enabled state changed");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Tell the engine a user-initiated request just went out; with
    /// piggybacking configured, queued work drains while the radio is
    /// warm.
    pub fn notify_user_network_activity(&self) {
        self.inner.monitor.record_user_network_activity();
        if self.inner.config.read().piggyback_on_user_requests {
            self.post(DrainTrigger::UserActivity);
        }
    }

    /// Host lifecycle hook for background transitions. With
    /// `flush_on_background`, a forced drain runs inside the host's
    /// background window; this resolves when it is done so the host can
    /// release the window.
    pub async fn notify_background(&self) -> Result<(), BatcherError> {
        let (done, wait) = oneshot::channel();
        self.inner
            .triggers
            .send(DrainTrigger::Background { done })
            .map_err(|_| BatcherError::Shutdown)?;
        wait.await.map_err(|_| BatcherError::Shutdown)
    }

    /// Statistics from `since` forward, composed with live device state.
    pub async fn statistics(
        &self,
        since: DateTime<Utc>,
    ) -> Result<BatcherStatistics, BatcherError> {
        let log = self.inner.store.transmission_stats(since).await?;
        let queued_requests = self.inner.store.count().await?;
        let queued_bytes = self.inner.store.total_payload_size().await?;
        let state = self.inner.monitor.state();
        Ok(BatcherStatistics {
            batch_count: log.batch_count,
            total_requests: log.total_requests,
            total_bytes: log.total_bytes,
            queued_requests,
            queued_bytes,
            network_type: state.network_type,
            is_charging: state.is_charging,
            battery_level: state.battery_level,
        })
    }

    /// Drop every pending request. The transmission log is untouched.
    pub async fn clear(&self) -> Result<(), BatcherError> {
        self.inner.store.clear().await?;
        Ok(())
    }

    /// Swap the configuration; takes effect at the next decision point.
    pub fn update_config(&self, config: BatcherConfig) -> Result<(), BatcherError> {
        config
            .validate()
            .map_err(|err| BatcherError::Configuration {
                message: err.to_string(),
            })?;
        *self.inner.classifier.write() =
            DomainClassifier::new(&config.immediate_domains, &config.deferrable_domains);
        *self.inner.config.write() = config;
        self.post(DrainTrigger::ConfigChanged);
        Ok(())
    }

    pub fn config(&self) -> BatcherConfig {
        self.inner.config.read().clone()
    }

    /// The device monitor; hosts feed platform signals through it.
    pub fn monitor(&self) -> &Arc<DeviceMonitor> {
        &self.inner.monitor
    }

    /// Stop accepting triggers, wait for any in-flight drain, then
    /// release the store. Idempotent.
    pub async fn shutdown(&self) -> Result<(), BatcherError> {
        let (done, wait) = oneshot::channel();
        if self
            .inner
            .triggers
            .send(DrainTrigger::Shutdown { done })
            .is_ok()
        {
            let _ = wait.await;
        }
        let handle = self.inner.scheduler.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        match self.inner.store.close().await {
            Ok(()) | Err(StoreError::WorkerGone) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn post(&self, trigger: DrainTrigger) {
        // The scheduler outlives every trigger source except shutdown;
        // a closed inbox just means the engine is already stopping.
        let _ = self.inner.triggers.send(trigger);
    }
}
