// Observable device conditions
//
// A `DeviceState` is a point-in-time snapshot; the monitor in the engine
// crate owns the live copy and is the only writer.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Link type as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Wifi,
    Cellular,
    Ethernet,
    Other,
    None,
    Unknown,
}

impl NetworkType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
            Self::Ethernet => "ethernet",
            Self::Other => "other",
            Self::None => "none",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wifi" => Ok(Self::Wifi),
            "cellular" => Ok(Self::Cellular),
            "ethernet" => Ok(Self::Ethernet),
            "other" => Ok(Self::Other),
            "none" => Ok(Self::None),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown network type: {}", other)),
        }
    }
}

/// Snapshot of device conditions relevant to transmission cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    pub network_type: NetworkType,
    pub is_connected: bool,
    pub is_charging: bool,
    /// Charge fraction in `[0.0, 1.0]`.
    pub battery_level: f64,
    /// Most recent user-initiated network request, if any. Only ever
    /// advances forward.
    pub last_user_network_activity: Option<Instant>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            network_type: NetworkType::Unknown,
            is_connected: false,
            is_charging: false,
            battery_level: 1.0,
            last_user_network_activity: None,
        }
    }
}

impl DeviceState {
    pub fn is_wifi(&self) -> bool {
        self.network_type == NetworkType::Wifi
    }

    pub fn is_cellular(&self) -> bool {
        self.network_type == NetworkType::Cellular
    }

    /// Whether the radio is presumed warm: a user request happened less
    /// than `window` ago.
    pub fn is_within_piggyback_window(&self, window: Duration) -> bool {
        self.is_within_piggyback_window_at(Instant::now(), window)
    }

    pub fn is_within_piggyback_window_at(&self, now: Instant, window: Duration) -> bool {
        match self.last_user_network_activity {
            Some(at) => now.saturating_duration_since(at) < window,
            None => false,
        }
    }
}
