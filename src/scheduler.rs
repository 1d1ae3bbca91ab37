// Drain scheduling
//
// The control plane is one task: it consumes a FIFO trigger inbox plus a
// periodic tick and runs drains inline, so at most one drain is ever in
// flight and no lock guards the invariant. Internal failures are logged
// and swallowed; the next tick retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use tailbatch_config::BatcherConfig;
use tailbatch_core::{evaluate, PolicyOptions, Priority};
use tailbatch_store::{RequestStore, TransmissionRecord};

use crate::monitor::DeviceMonitor;
use crate::transmitter::Transmitter;

pub(crate) enum DrainTrigger {
    /// A request was just persisted; check forcing limits, maybe drain.
    Enqueued,
    /// User-initiated traffic just went out; the radio is warm.
    UserActivity,
    /// Host is moving to the background.
    Background { done: oneshot::Sender<()> },
    /// Caller-forced drain; bypasses policy and the batch interval.
    Flush {
        reason: String,
        done: oneshot::Sender<()>,
    },
    /// Configuration changed; re-arm the periodic tick.
    ConfigChanged,
    Shutdown { done: oneshot::Sender<()> },
}

enum Step {
    Continue,
    Rearm,
    Stop,
}

/// The drain interval doubles as the tick period; a zero interval still
/// needs a heartbeat.
const MIN_TICK: Duration = Duration::from_secs(1);

/// Retention sweeps ride along with drains, at most this often.
const LOG_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

pub(crate) fn policy_options(config: &BatcherConfig) -> PolicyOptions {
    PolicyOptions {
        allow_cellular: config.allow_cellular,
        require_wifi_for_bulk: config.require_wifi_for_bulk,
        prefer_wifi: config.prefer_wifi,
        prefer_charging: config.prefer_charging,
        piggyback_window: config.piggyback_window(),
    }
}

pub(crate) struct Scheduler {
    store: RequestStore,
    monitor: Arc<DeviceMonitor>,
    transmitter: Transmitter,
    config: Arc<RwLock<BatcherConfig>>,
    enabled: Arc<AtomicBool>,
    inbox: mpsc::UnboundedReceiver<DrainTrigger>,
    /// For re-posting triggers displaced while coalescing flush bursts.
    loopback: mpsc::UnboundedSender<DrainTrigger>,
    last_transmission: Option<Instant>,
    last_log_prune: Instant,
}

impl Scheduler {
    pub(crate) fn new(
        store: RequestStore,
        monitor: Arc<DeviceMonitor>,
        transmitter: Transmitter,
        config: Arc<RwLock<BatcherConfig>>,
        enabled: Arc<AtomicBool>,
        inbox: mpsc::UnboundedReceiver<DrainTrigger>,
        loopback: mpsc::UnboundedSender<DrainTrigger>,
    ) -> Self {
        Self {
            store,
            monitor,
            transmitter,
            config,
            enabled,
            inbox,
            loopback,
            last_transmission: None,
            last_log_prune: Instant::now(),
        }
    }

    pub(crate) async fn run(mut self) {
        let mut tick = new_tick(self.tick_period());
        loop {
            tokio::select! {
                maybe = self.inbox.recv() => {
                    match maybe {
                        Some(trigger) => match self.handle(trigger).await {
                            Step::Continue => {}
                            Step::Rearm => tick = new_tick(self.tick_period()),
                            Step::Stop => break,
                        },
                        // Façade dropped without shutdown; nothing left to do.
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    if self.is_enabled() {
                        self.maybe_drain("periodic").await;
                    }
                }
            }
        }
        debug!("scheduler stopped");
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn tick_period(&self) -> Duration {
        self.config.read().min_batch_interval().max(MIN_TICK)
    }

    async fn handle(&mut self, trigger: DrainTrigger) -> Step {
        match trigger {
            DrainTrigger::Enqueued => {
                self.on_enqueued().await;
                Step::Continue
            }
            DrainTrigger::UserActivity => {
                if self.is_enabled() && self.config.read().piggyback_on_user_requests {
                    self.maybe_drain("user activity").await;
                }
                Step::Continue
            }
            DrainTrigger::Background { done } => {
                if self.is_enabled() && self.config.read().flush_on_background {
                    self.drain(true, "background").await;
                }
                let _ = done.send(());
                Step::Continue
            }
            DrainTrigger::Flush { reason, done } => {
                // A burst of flushes coalesces into one drain. The first
                // non-flush trigger pulled while collecting is re-posted;
                // triggers are idempotent hints, so the shifted order is
                // harmless.
                let mut waiters = vec![done];
                while let Ok(next) = self.inbox.try_recv() {
                    match next {
                        DrainTrigger::Flush { done, .. } => waiters.push(done),
                        other => {
                            let _ = self.loopback.send(other);
                            break;
                        }
                    }
                }
                self.drain(true, &reason).await;
                for waiter in waiters {
                    let _ = waiter.send(());
                }
                Step::Continue
            }
            DrainTrigger::ConfigChanged => Step::Rearm,
            DrainTrigger::Shutdown { done } => {
                let _ = done.send(());
                Step::Stop
            }
        }
    }

    async fn on_enqueued(&mut self) {
        if !self.is_enabled() {
            return;
        }
        let (max_queue, max_payload) = {
            let config = self.config.read();
            (config.max_queue_size, config.max_payload_size)
        };

        let pending = match self.store.count().await {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "queue size check failed");
                return;
            }
        };
        if pending as usize >= max_queue {
            self.drain(true, "queue limit").await;
            return;
        }

        let payload = match self.store.total_payload_size().await {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "payload size check failed");
                return;
            }
        };
        if payload as usize >= max_payload {
            self.drain(true, "payload limit").await;
            return;
        }

        self.maybe_drain("enqueue").await;
    }

    /// Policy-gated drain path: the batch interval must have elapsed and
    /// the evaluator must approve for the representative `deferrable`
    /// class.
    async fn maybe_drain(&mut self, reason: &str) {
        let config = self.config.read().clone();
        if let Some(last) = self.last_transmission {
            if last.elapsed() < config.min_batch_interval() {
                debug!(reason, "drain skipped: within min batch interval");
                return;
            }
        }

        let state = self.monitor.state();
        let decision = evaluate(&state, &policy_options(&config), Priority::Deferrable);
        if !decision.should_transmit() {
            debug!(reason, wait = decision.reason(), "drain skipped by policy");
            return;
        }

        self.drain(false, reason).await;
    }

    async fn drain(&mut self, forced: bool, reason: &str) {
        let config = self.config.read().clone();

        let dropped = match self.store.delete_expired().await {
            Ok(n) => n,
            Err(err) => {
                error!(error = %err, "expiry sweep failed; drain aborted");
                return;
            }
        };
        if dropped > 0 {
            debug!(dropped, "dropped expired requests past their deadline");
        }

        let batch = match self.store.fetch_batch(config.max_batch_size).await {
            Ok(batch) => batch,
            Err(err) => {
                error!(error = %err, "batch fetch failed; drain aborted");
                return;
            }
        };
        if batch.is_empty() {
            debug!(reason, forced, "nothing to drain");
            return;
        }

        let state = self.monitor.state();
        match self.transmitter.transmit(batch).await {
            Ok(outcome) => {
                if config.enable_metrics {
                    let record = TransmissionRecord {
                        timestamp: Utc::now(),
                        request_count: outcome.succeeded as u64,
                        total_bytes: outcome.bytes,
                        network_type: state.network_type,
                        is_charging: state.is_charging,
                        trigger_reason: reason.to_string(),
                    };
                    if let Err(err) = self.store.log_transmission(record).await {
                        warn!(error = %err, "failed to record transmission");
                    }
                }
                self.last_transmission = Some(Instant::now());
                if config.enable_logging {
                    info!(
                        reason,
                        forced,
                        attempted = outcome.attempted,
                        succeeded = outcome.succeeded,
                        failed = outcome.failed,
                        bytes = outcome.bytes,
                        "drain complete"
                    );
                } else {
                    debug!(reason, succeeded = outcome.succeeded, "drain complete");
                }
                self.prune_log_if_due(&config).await;
            }
            Err(err) => {
                // The batch stays queued in full; the next tick retries.
                error!(error = %err, "drain aborted mid-batch");
            }
        }
    }

    async fn prune_log_if_due(&mut self, config: &BatcherConfig) {
        if config.log_retention_secs == 0 || self.last_log_prune.elapsed() < LOG_PRUNE_INTERVAL {
            return;
        }
        self.last_log_prune = Instant::now();
        let cutoff = Utc::now() - chrono::Duration::seconds(config.log_retention_secs as i64);
        match self.store.prune_transmission_log(cutoff).await {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "pruned transmission log"),
            Err(err) => warn!(error = %err, "transmission log prune failed"),
        }
    }
}

fn new_tick(period: Duration) -> Interval {
    // interval() fires immediately; the first drain should wait a full
    // period.
    let mut tick = interval_at(tokio::time::Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick
}
