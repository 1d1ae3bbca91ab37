// Batch transmission
//
// Groups a drained batch by host so each connection stays warm, replays
// requests through the transport, and finalizes outcomes back into the
// store. Hosts fan out concurrently; a single host's requests never split
// across workers and keep their fetch order.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use tailbatch_core::{DeferredRequest, RequestId};
use tailbatch_store::{RequestStore, StoreError};

use crate::transport::Transport;

/// Aggregate result of one drain handed back to the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Payload bytes of the delivered requests.
    pub bytes: u64,
}

pub(crate) struct Transmitter {
    transport: Arc<dyn Transport>,
    store: RequestStore,
}

impl Transmitter {
    pub(crate) fn new(transport: Arc<dyn Transport>, store: RequestStore) -> Self {
        Self { transport, store }
    }

    /// Transmit a batch. Per-request failures are kept for a later drain;
    /// only a store failure aborts (the batch stays intact for retry).
    pub(crate) async fn transmit(
        &self,
        batch: Vec<DeferredRequest>,
    ) -> Result<DrainOutcome, StoreError> {
        let attempted = batch.len();
        let groups = group_by_domain(batch);

        let mut workers = JoinSet::new();
        for (domain, requests) in groups {
            let transport = Arc::clone(&self.transport);
            workers.spawn(async move { send_group(transport, domain, requests).await });
        }

        let mut succeeded: Vec<RequestId> = Vec::new();
        let mut failed = 0usize;
        let mut bytes = 0u64;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(group) => {
                    bytes += group.bytes;
                    failed += group.failed;
                    succeeded.extend(group.delivered);
                }
                Err(err) => {
                    // A panicked worker loses nothing durable; its requests
                    // simply stay queued.
                    warn!(error = %err, "transmission worker failed");
                }
            }
        }

        let delivered = succeeded.len();
        if !succeeded.is_empty() {
            self.store.delete(succeeded).await?;
            debug!(delivered, attempted, "removed delivered requests");
        }

        Ok(DrainOutcome {
            attempted,
            succeeded: delivered,
            failed,
            bytes,
        })
    }
}

struct GroupOutcome {
    delivered: Vec<RequestId>,
    failed: usize,
    bytes: u64,
}

async fn send_group(
    transport: Arc<dyn Transport>,
    domain: String,
    requests: Vec<DeferredRequest>,
) -> GroupOutcome {
    let mut outcome = GroupOutcome {
        delivered: Vec::new(),
        failed: 0,
        bytes: 0,
    };
    for request in requests {
        match transport.send(&request).await {
            Ok(response) if response.is_success() => {
                outcome.bytes += request.payload_size() as u64;
                outcome.delivered.push(request.id);
            }
            Ok(response) => {
                debug!(
                    host = %domain,
                    id = %request.id,
                    status = response.status,
                    "request rejected; kept for retry"
                );
                outcome.failed += 1;
            }
            Err(err) => {
                debug!(
                    host = %domain,
                    id = %request.id,
                    error = %err,
                    "request errored; kept for retry"
                );
                outcome.failed += 1;
            }
        }
    }
    outcome
}

/// Group while preserving each host's fetch order. Batches are small
/// (bounded by max_batch_size), so a linear scan beats a map here.
fn group_by_domain(batch: Vec<DeferredRequest>) -> Vec<(String, Vec<DeferredRequest>)> {
    let mut groups: Vec<(String, Vec<DeferredRequest>)> = Vec::new();
    for request in batch {
        let domain = request.domain().unwrap_or_default();
        match groups.iter_mut().find(|(d, _)| *d == domain) {
            Some((_, requests)) => requests.push(request),
            None => groups.push((domain, vec![request])),
        }
    }
    groups
}
