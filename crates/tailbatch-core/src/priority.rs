// Transmission priority model
//
// The integer encoding is part of the storage contract: lower values sort
// first when a batch is fetched, so more urgent work always drains first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transmission priority, from most to least urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Sent inline by the façade; never enters the durable queue.
    Immediate = 1,
    /// Default for unclassified traffic.
    Soon = 2,
    /// Latency-tolerant; waits for favorable conditions.
    Deferrable = 3,
    /// Most latency-tolerant; may additionally be restricted to WiFi.
    Bulk = 4,
}

impl Priority {
    pub const fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Immediate),
            2 => Some(Self::Soon),
            3 => Some(Self::Deferrable),
            4 => Some(Self::Bulk),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Soon => "soon",
            Self::Deferrable => "deferrable",
            Self::Bulk => "bulk",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing priority hint.
///
/// `Auto` defers to the domain classifier; everything else is used as-is.
/// `Bulk` can only be reached through an explicit hint - the classifier
/// never infers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityHint {
    #[default]
    Auto,
    Immediate,
    Soon,
    Deferrable,
    Bulk,
}

impl PriorityHint {
    /// The explicitly requested priority, or `None` for `Auto`.
    pub fn explicit(self) -> Option<Priority> {
        match self {
            Self::Auto => None,
            Self::Immediate => Some(Priority::Immediate),
            Self::Soon => Some(Priority::Soon),
            Self::Deferrable => Some(Priority::Deferrable),
            Self::Bulk => Some(Priority::Bulk),
        }
    }
}

impl From<Priority> for PriorityHint {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Immediate => Self::Immediate,
            Priority::Soon => Self::Soon,
            Priority::Deferrable => Self::Deferrable,
            Priority::Bulk => Self::Bulk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding_round_trip() {
        for priority in [
            Priority::Immediate,
            Priority::Soon,
            Priority::Deferrable,
            Priority::Bulk,
        ] {
            assert_eq!(Priority::from_i64(priority.as_i64()), Some(priority));
        }
        assert_eq!(Priority::from_i64(0), None);
        assert_eq!(Priority::from_i64(5), None);
    }

    #[test]
    fn test_urgency_ordering() {
        assert!(Priority::Immediate < Priority::Soon);
        assert!(Priority::Soon < Priority::Deferrable);
        assert!(Priority::Deferrable < Priority::Bulk);
    }

    #[test]
    fn test_hint_resolution() {
        assert_eq!(PriorityHint::Auto.explicit(), None);
        assert_eq!(PriorityHint::Bulk.explicit(), Some(Priority::Bulk));
        assert_eq!(PriorityHint::from(Priority::Soon), PriorityHint::Soon);
    }
}
