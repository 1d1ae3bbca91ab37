// Transmission log records and aggregates

use chrono::{DateTime, Utc};
use tailbatch_core::NetworkType;

/// One appended row of the transmission log: the result of a single drain
/// that had work to do.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionRecord {
    pub timestamp: DateTime<Utc>,
    /// Requests successfully delivered in the batch (may be zero).
    pub request_count: u64,
    /// Sum of payload sizes of the delivered requests.
    pub total_bytes: u64,
    pub network_type: NetworkType,
    pub is_charging: bool,
    /// What caused the drain ("periodic", "flush", "queue limit", ...).
    pub trigger_reason: String,
}

/// Aggregates over the transmission log from a starting instant forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmissionStats {
    pub batch_count: u64,
    pub total_requests: u64,
    pub total_bytes: u64,
}
