// Configuration source loading
//
// Priority, highest first: TAILBATCH_* environment overrides, a config
// file (explicit path, inline content, or default locations), then the
// preset named by TAILBATCH_PRESET (balanced when unset). A config file
// replaces the preset wholesale; fields it omits fall back to balanced.

use crate::{BatcherConfig, Preset};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::Path;
use std::str::FromStr;

const ENV_PREFIX: &str = "TAILBATCH_";

/// Load configuration from all sources.
pub fn load_config() -> Result<BatcherConfig> {
    let mut config = match load_from_file()? {
        Some(file_config) => file_config,
        None => preset_defaults()?,
    };

    apply_env_overrides(&mut config)?;

    config.validate()?;

    Ok(config)
}

fn preset_defaults() -> Result<BatcherConfig> {
    let preset = match env_var("PRESET")? {
        Some(name) => name
            .parse::<Preset>()
            .context("Invalid TAILBATCH_PRESET value")?,
        None => Preset::Balanced,
    };
    Ok(BatcherConfig::preset(preset))
}

/// Config TOML located somewhere; `origin` only feeds error messages.
struct ConfigSource {
    origin: String,
    text: String,
}

/// Load configuration from file, if one is configured or present.
fn load_from_file() -> Result<Option<BatcherConfig>> {
    let source = match locate_config()? {
        Some(source) => source,
        None => return Ok(None),
    };
    let config = toml::from_str(&source.text)
        .with_context(|| format!("invalid batcher config from {}", source.origin))?;
    Ok(Some(config))
}

/// An explicit TAILBATCH_CONFIG path wins, then inline
/// TAILBATCH_CONFIG_CONTENT, then the first default location that exists.
fn locate_config() -> Result<Option<ConfigSource>> {
    if let Ok(path) = env::var("TAILBATCH_CONFIG") {
        return read_config_file(&path).map(Some);
    }

    if let Ok(text) = env::var("TAILBATCH_CONFIG_CONTENT") {
        return Ok(Some(ConfigSource {
            origin: "TAILBATCH_CONFIG_CONTENT".to_string(),
            text,
        }));
    }

    for candidate in ["./tailbatch.toml", "./.tailbatch.toml"] {
        if Path::new(candidate).exists() {
            return read_config_file(candidate).map(Some);
        }
    }

    Ok(None)
}

fn read_config_file(path: &str) -> Result<ConfigSource> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read config file {path}"))?;
    Ok(ConfigSource {
        origin: path.to_string(),
        text,
    })
}

/// Apply environment variable overrides (highest priority).
fn apply_env_overrides(config: &mut BatcherConfig) -> Result<()> {
    if let Some(val) = env_parse("MAX_DEFERRAL_SECS")? {
        config.max_deferral_secs = val;
    }
    if let Some(val) = env_parse("MIN_BATCH_INTERVAL_SECS")? {
        config.min_batch_interval_secs = val;
    }
    if let Some(val) = env_parse("PIGGYBACK_WINDOW_SECS")? {
        config.piggyback_window_secs = val;
    }
    if let Some(val) = env_parse("MAX_QUEUE_SIZE")? {
        config.max_queue_size = val;
    }
    if let Some(val) = env_parse("MAX_PAYLOAD_SIZE")? {
        config.max_payload_size = val;
    }
    if let Some(val) = env_parse("MAX_BATCH_SIZE")? {
        config.max_batch_size = val;
    }
    if let Some(val) = env_flag("PREFER_WIFI")? {
        config.prefer_wifi = val;
    }
    if let Some(val) = env_flag("PREFER_CHARGING")? {
        config.prefer_charging = val;
    }
    if let Some(val) = env_flag("PIGGYBACK_ON_USER_REQUESTS")? {
        config.piggyback_on_user_requests = val;
    }
    if let Some(val) = env_flag("FLUSH_ON_BACKGROUND")? {
        config.flush_on_background = val;
    }
    if let Some(val) = env_flag("ALLOW_CELLULAR")? {
        config.allow_cellular = val;
    }
    if let Some(val) = env_flag("REQUIRE_WIFI_FOR_BULK")? {
        config.require_wifi_for_bulk = val;
    }
    if let Some(val) = env_var("IMMEDIATE_DOMAINS")? {
        config.immediate_domains = split_domains(&val);
    }
    if let Some(val) = env_var("DEFERRABLE_DOMAINS")? {
        config.deferrable_domains = split_domains(&val);
    }
    if let Some(val) = env_flag("ENABLE_LOGGING")? {
        config.enable_logging = val;
    }
    if let Some(val) = env_flag("ENABLE_METRICS")? {
        config.enable_metrics = val;
    }
    if let Some(val) = env_parse("LOG_RETENTION_SECS")? {
        config.log_retention_secs = val;
    }

    Ok(())
}

fn split_domains(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

/// One `TAILBATCH_*` variable as raw text; unset and blank both read as
/// absent so a stray `FOO=` in a launch script cannot zero a field.
fn env_var(name: &str) -> Result<Option<String>> {
    let qualified = format!("{ENV_PREFIX}{name}");
    match env::var(&qualified) {
        Ok(raw) => {
            let raw = raw.trim();
            Ok((!raw.is_empty()).then(|| raw.to_string()))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("could not read {qualified}")),
    }
}

/// A `TAILBATCH_*` variable parsed through `FromStr`; covers every numeric
/// field.
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)?
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|err| anyhow!("{ENV_PREFIX}{name}: {err} (got {raw:?})"))
        })
        .transpose()
}

/// Boolean toggles accept the usual spellings: true/false, 1/0, yes/no,
/// on/off.
fn env_flag(name: &str) -> Result<Option<bool>> {
    let Some(raw) = env_var(name)? else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        other => anyhow::bail!("{ENV_PREFIX}{name} is not a boolean: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_domains() {
        assert_eq!(
            split_domains("Analytics.example.com, telemetry , ,crash"),
            vec!["analytics.example.com", "telemetry", "crash"]
        );
        assert!(split_domains("").is_empty());
    }

    #[test]
    fn test_partial_file_falls_back_to_balanced() {
        let config: BatcherConfig =
            toml::from_str("max_batch_size = 7\nallow_cellular = false\n").unwrap();
        assert_eq!(config.max_batch_size, 7);
        assert!(!config.allow_cellular);
        // Unmentioned fields keep balanced defaults.
        assert_eq!(config.max_deferral_secs, 900);
        assert_eq!(config.max_queue_size, 100);
    }
}
