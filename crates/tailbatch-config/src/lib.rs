// tailbatch-config - batcher configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from TAILBATCH_CONFIG env var
// 3. Config file contents from TAILBATCH_CONFIG_CONTENT env var
// 4. Default config file locations (./tailbatch.toml, ./.tailbatch.toml)
// 5. Preset defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod sources;
mod validation;

pub use sources::load_config;

/// Behavioral preset the configuration starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Balanced,
    BatterySaver,
    Minimal,
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preset::Balanced => write!(f, "balanced"),
            Preset::BatterySaver => write!(f, "battery_saver"),
            Preset::Minimal => write!(f, "minimal"),
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "balanced" => Ok(Preset::Balanced),
            "battery_saver" | "battery-saver" => Ok(Preset::BatterySaver),
            "minimal" => Ok(Preset::Minimal),
            _ => anyhow::bail!(
                "Unsupported preset: {}. Supported: balanced, battery_saver, minimal",
                s
            ),
        }
    }
}

/// Runtime configuration for the batcher.
///
/// Hot-swappable: the engine snapshots it at every decision point, so an
/// update takes effect on the next decision rather than mid-drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Default per-request deadline when the caller does not override it.
    pub max_deferral_secs: u64,
    /// Lower bound between two successful drains.
    pub min_batch_interval_secs: u64,
    /// How long after user-initiated traffic the radio counts as warm.
    pub piggyback_window_secs: u64,
    /// Pending count at or above this forces a drain.
    pub max_queue_size: usize,
    /// Pending payload bytes at or above this forces a drain.
    pub max_payload_size: usize,
    /// Upper bound on requests fetched per drain.
    pub max_batch_size: usize,
    pub prefer_wifi: bool,
    pub prefer_charging: bool,
    /// Whether user-activity notifications trigger drains.
    pub piggyback_on_user_requests: bool,
    /// Whether host backgrounding triggers a forced drain.
    pub flush_on_background: bool,
    /// If false, never transmit on cellular.
    pub allow_cellular: bool,
    /// Bulk priority transmits only on WiFi.
    pub require_wifi_for_bulk: bool,
    /// Host substrings classified as immediate (lowercased on use).
    pub immediate_domains: Vec<String>,
    /// Host substrings classified as deferrable (lowercased on use).
    pub deferrable_domains: Vec<String>,
    pub enable_logging: bool,
    pub enable_metrics: bool,
    /// Transmission-log rows older than this are pruned opportunistically.
    pub log_retention_secs: u64,
}

impl BatcherConfig {
    /// Balanced defaults: 15-minute deadlines, minute-granularity drains.
    pub fn balanced() -> Self {
        Self {
            max_deferral_secs: 900,
            min_batch_interval_secs: 60,
            piggyback_window_secs: 5,
            max_queue_size: 100,
            max_payload_size: 100_000,
            max_batch_size: 20,
            prefer_wifi: true,
            prefer_charging: true,
            piggyback_on_user_requests: true,
            flush_on_background: true,
            allow_cellular: true,
            require_wifi_for_bulk: true,
            immediate_domains: Vec::new(),
            deferrable_domains: Vec::new(),
            enable_logging: true,
            enable_metrics: true,
            log_retention_secs: 7 * 24 * 3600,
        }
    }

    /// Longer deadlines and rarer drains; maximizes batching.
    pub fn battery_saver() -> Self {
        Self {
            max_deferral_secs: 1800,
            min_batch_interval_secs: 300,
            ..Self::balanced()
        }
    }

    /// Short deadlines, frequent drains, no WiFi restriction on bulk.
    pub fn minimal() -> Self {
        Self {
            max_deferral_secs: 300,
            min_batch_interval_secs: 30,
            require_wifi_for_bulk: false,
            ..Self::balanced()
        }
    }

    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Balanced => Self::balanced(),
            Preset::BatterySaver => Self::battery_saver(),
            Preset::Minimal => Self::minimal(),
        }
    }

    pub fn max_deferral(&self) -> Duration {
        Duration::from_secs(self.max_deferral_secs)
    }

    pub fn min_batch_interval(&self) -> Duration {
        Duration::from_secs(self.min_batch_interval_secs)
    }

    pub fn piggyback_window(&self) -> Duration {
        Duration::from_secs(self.piggyback_window_secs)
    }

    pub fn log_retention(&self) -> Duration {
        Duration::from_secs(self.log_retention_secs)
    }

    /// Load configuration from all sources with priority.
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_from_str() {
        assert_eq!("balanced".parse::<Preset>().unwrap(), Preset::Balanced);
        assert_eq!(
            "battery_saver".parse::<Preset>().unwrap(),
            Preset::BatterySaver
        );
        assert_eq!(
            "battery-saver".parse::<Preset>().unwrap(),
            Preset::BatterySaver
        );
        assert_eq!("minimal".parse::<Preset>().unwrap(), Preset::Minimal);
        assert!("turbo".parse::<Preset>().is_err());
    }

    #[test]
    fn test_preset_values() {
        let balanced = BatcherConfig::balanced();
        assert_eq!(balanced.max_deferral(), Duration::from_secs(900));
        assert_eq!(balanced.min_batch_interval(), Duration::from_secs(60));
        assert!(balanced.require_wifi_for_bulk);

        let saver = BatcherConfig::battery_saver();
        assert_eq!(saver.max_deferral(), Duration::from_secs(1800));
        assert_eq!(saver.min_batch_interval(), Duration::from_secs(300));
        assert!(saver.require_wifi_for_bulk);

        let minimal = BatcherConfig::minimal();
        assert_eq!(minimal.max_deferral(), Duration::from_secs(300));
        assert_eq!(minimal.min_batch_interval(), Duration::from_secs(30));
        assert!(!minimal.require_wifi_for_bulk);

        // Shared across presets.
        for config in [balanced, saver, minimal] {
            assert_eq!(config.piggyback_window(), Duration::from_secs(5));
            assert_eq!(config.max_queue_size, 100);
            assert_eq!(config.max_payload_size, 100_000);
            assert_eq!(config.max_batch_size, 20);
        }
    }

    #[test]
    fn test_preset_construction_is_idempotent() {
        assert_eq!(BatcherConfig::balanced(), BatcherConfig::balanced());
        assert_eq!(
            BatcherConfig::preset(Preset::Minimal),
            BatcherConfig::preset(Preset::Minimal)
        );
        assert_eq!(BatcherConfig::default(), BatcherConfig::balanced());
    }

    #[test]
    fn test_field_round_trip() {
        // Every field set to a non-default value survives serialization.
        let config = BatcherConfig {
            max_deferral_secs: 123,
            min_batch_interval_secs: 7,
            piggyback_window_secs: 11,
            max_queue_size: 42,
            max_payload_size: 4096,
            max_batch_size: 5,
            prefer_wifi: false,
            prefer_charging: false,
            piggyback_on_user_requests: false,
            flush_on_background: false,
            allow_cellular: false,
            require_wifi_for_bulk: false,
            immediate_domains: vec!["pay.example.com".to_string()],
            deferrable_domains: vec!["analytics".to_string()],
            enable_logging: false,
            enable_metrics: false,
            log_retention_secs: 3600,
        };
        let text = toml::to_string(&config).unwrap();
        let back: BatcherConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
