// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the resilient store.
//!
//! # Example
//!
//! ```
//! use resilient_store::StoreConfig;
//!
//! // Minimal config (uses defaults)
//! let config = StoreConfig::default();
//! assert_eq!(config.url, "redis://127.0.0.1:6379");
//! assert_eq!(config.max_retries, 10);
//!
//! // Full config
//! let config = StoreConfig {
//!     url: "redis://cache.internal:6379".into(),
//!     key_prefix: Some("myapp:".into()),
//!     connect_timeout_ms: 500,
//!     offline_queueing: false,
//!     ..Default::default()
//! };
//! assert_eq!(config.connect_timeout().as_millis(), 500);
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::resilience::retry::RetryPolicy;
use crate::resilience::supervisor::SupervisorConfig;
use crate::storage::traits::StoreError;

/// Configuration for the resilient store.
///
/// All fields have sensible defaults; a local Redis on the default port
/// works with no configuration at all.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    #[serde(default = "default_url")]
    pub url: String,

    /// Prefix applied to every remote key (e.g., "myapp:")
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Consecutive failed connect attempts before `Failed`
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Bound on a single connect attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Wait for an in-flight connect attempt (true) or go straight to the fallback (false)
    #[serde(default = "default_offline_queueing")]
    pub offline_queueing: bool,

    /// Backoff: delay before retry `i` is `min(i * step, max)`
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// How long `Failed` suppresses new connect attempts
    #[serde(default = "default_failed_cooldown_ms")]
    pub failed_cooldown_ms: u64,
}

fn default_url() -> String { "redis://127.0.0.1:6379".to_string() }
fn default_max_retries() -> usize { 10 }
fn default_connect_timeout_ms() -> u64 { 2000 }
fn default_offline_queueing() -> bool { true }
fn default_retry_step_ms() -> u64 { 100 }
fn default_retry_max_delay_ms() -> u64 { 3000 }
fn default_failed_cooldown_ms() -> u64 { 5000 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key_prefix: None,
            max_retries: default_max_retries(),
            connect_timeout_ms: default_connect_timeout_ms(),
            offline_queueing: default_offline_queueing(),
            retry_step_ms: default_retry_step_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            failed_cooldown_ms: default_failed_cooldown_ms(),
        }
    }
}

impl StoreConfig {
    /// Read `STORE_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), with a caller-supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("STORE_URL") {
            config.url = url;
        }
        if let Some(prefix) = lookup("STORE_KEY_PREFIX") {
            config.key_prefix = (!prefix.is_empty()).then_some(prefix);
        }
        parse_into(&lookup, "STORE_MAX_RETRIES", &mut config.max_retries)?;
        parse_into(&lookup, "STORE_CONNECT_TIMEOUT_MS", &mut config.connect_timeout_ms)?;
        parse_into(&lookup, "STORE_OFFLINE_QUEUEING", &mut config.offline_queueing)?;
        parse_into(&lookup, "STORE_RETRY_STEP_MS", &mut config.retry_step_ms)?;
        parse_into(&lookup, "STORE_RETRY_MAX_DELAY_MS", &mut config.retry_max_delay_ms)?;
        parse_into(&lookup, "STORE_FAILED_COOLDOWN_MS", &mut config.failed_cooldown_ms)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_retries == 0 {
            return Err(StoreError::Config("max_retries must be at least 1".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(StoreError::Config("connect_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            step: Duration::from_millis(self.retry_step_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            max_attempts: self.max_retries,
        }
    }

    #[must_use]
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            retry: self.retry_policy(),
            connect_timeout: self.connect_timeout(),
            offline_queueing: self.offline_queueing,
            failed_cooldown: Duration::from_millis(self.failed_cooldown_ms),
        }
    }
}

fn parse_into<F, T>(lookup: &F, name: &str, slot: &mut T) -> Result<(), StoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| StoreError::Config(format!("{}={:?}: {}", name, raw, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.key_prefix, None);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
        assert!(config.offline_queueing);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = StoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            ("STORE_URL", "redis://cache:6380/2"),
            ("STORE_KEY_PREFIX", "app:"),
            ("STORE_MAX_RETRIES", "4"),
            ("STORE_CONNECT_TIMEOUT_MS", "250"),
            ("STORE_OFFLINE_QUEUEING", "false"),
            ("STORE_FAILED_COOLDOWN_MS", "100"),
        ]))
        .unwrap();

        assert_eq!(config.url, "redis://cache:6380/2");
        assert_eq!(config.key_prefix.as_deref(), Some("app:"));
        assert_eq!(config.max_retries, 4);
        assert!(!config.offline_queueing);

        let sup = config.supervisor_config();
        assert_eq!(sup.retry.max_attempts, 4);
        assert_eq!(sup.connect_timeout, Duration::from_millis(250));
        assert_eq!(sup.failed_cooldown, Duration::from_millis(100));
    }

    #[test]
    fn test_empty_prefix_means_none() {
        let config = StoreConfig::from_lookup(lookup_from(&[("STORE_KEY_PREFIX", "")])).unwrap();
        assert_eq!(config.key_prefix, None);
    }

    #[test]
    fn test_unparseable_value_is_config_error() {
        let err = StoreConfig::from_lookup(lookup_from(&[("STORE_MAX_RETRIES", "lots")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(ref msg) if msg.contains("STORE_MAX_RETRIES")));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let err = StoreConfig::from_lookup(lookup_from(&[("STORE_MAX_RETRIES", "0")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"url": "redis://other:6379", "max_retries": 3}"#).unwrap();
        assert_eq!(config.url, "redis://other:6379");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_step_ms, 100);
    }
}
