// Statistics snapshot

use serde::Serialize;

use tailbatch_core::NetworkType;

/// Point-in-time statistics composing transmission-log aggregates with
/// live device state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatcherStatistics {
    /// Batches that ran (with at least one request attempted).
    pub batch_count: u64,
    /// Requests successfully delivered.
    pub total_requests: u64,
    /// Payload bytes successfully delivered.
    pub total_bytes: u64,
    pub queued_requests: u64,
    pub queued_bytes: u64,
    pub network_type: NetworkType,
    pub is_charging: bool,
    pub battery_level: f64,
}

impl BatcherStatistics {
    /// 0.0 until the first batch has run.
    pub fn average_requests_per_batch(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_requests as f64 / self.batch_count as f64
        }
    }

    /// Every delivered request beyond the first in its batch is one radio
    /// wake-up that did not happen.
    pub fn estimated_wake_ups_saved(&self) -> u64 {
        self.total_requests.saturating_sub(self.batch_count)
    }
}
