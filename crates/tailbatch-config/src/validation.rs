// Configuration validation
//
// Validates that limits are non-zero and values are sensible

use crate::BatcherConfig;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &BatcherConfig) -> Result<()> {
    if config.max_deferral_secs == 0 {
        bail!("max_deferral_secs must be greater than 0");
    }

    if config.max_queue_size == 0 {
        bail!("max_queue_size must be greater than 0");
    }

    if config.max_payload_size == 0 {
        bail!("max_payload_size must be greater than 0");
    }

    if config.max_batch_size == 0 {
        bail!("max_batch_size must be greater than 0");
    }

    // An empty-string domain entry matches every host.
    if config.immediate_domains.iter().any(|d| d.is_empty()) {
        bail!("immediate_domains must not contain empty entries");
    }
    if config.deferrable_domains.iter().any(|d| d.is_empty()) {
        bail!("deferrable_domains must not contain empty entries");
    }

    if config.max_batch_size > config.max_queue_size {
        warn!(
            max_batch_size = config.max_batch_size,
            max_queue_size = config.max_queue_size,
            "max_batch_size exceeds max_queue_size; drains will never fill a batch"
        );
    }

    if config.min_batch_interval_secs > config.max_deferral_secs {
        warn!(
            min_batch_interval_secs = config.min_batch_interval_secs,
            max_deferral_secs = config.max_deferral_secs,
            "drain interval exceeds request deadlines; expiry will outpace drains"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(BatcherConfig::balanced().validate().is_ok());
        assert!(BatcherConfig::battery_saver().validate().is_ok());
        assert!(BatcherConfig::minimal().validate().is_ok());
    }

    #[test]
    fn test_zero_limits_rejected() {
        for mutate in [
            (|c: &mut BatcherConfig| c.max_deferral_secs = 0) as fn(&mut BatcherConfig),
            |c| c.max_queue_size = 0,
            |c| c.max_payload_size = 0,
            |c| c.max_batch_size = 0,
        ] {
            let mut config = BatcherConfig::balanced();
            mutate(&mut config);
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_empty_domain_entry_rejected() {
        let mut config = BatcherConfig::balanced();
        config.immediate_domains = vec![String::new()];
        assert!(config.validate().is_err());

        let mut config = BatcherConfig::balanced();
        config.deferrable_domains = vec!["ok".to_string(), String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_is_allowed() {
        // A zero drain interval is valid; the scheduler clamps its tick.
        let mut config = BatcherConfig::balanced();
        config.min_batch_interval_secs = 0;
        assert!(config.validate().is_ok());
    }
}
