// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination defaults
//!
//! Shared by every lock primitive. Loadable from TOML:
//!
//! ```toml
//! namespace_prefix = "billing"
//! lock_ttl = "10s"
//! spin_interval = "10ms"
//! lock_timeout = "30s"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Defaults for store-backed coordination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Prefix for every key a lock writes to the store
    pub namespace_prefix: String,
    /// Expiry of a distributed lock key; reclaims locks of crashed holders
    #[serde(with = "humantime_serde")]
    pub lock_ttl: Duration,
    /// Sleep between attempts while spinning for a lock
    #[serde(with = "humantime_serde")]
    pub spin_interval: Duration,
    /// Overall budget for spinning; `None` waits forever
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Option<Duration>,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            namespace_prefix: "cosync".to_string(),
            lock_ttl: Duration::from_secs(10),
            spin_interval: Duration::from_millis(10),
            lock_timeout: None,
        }
    }
}

impl CoordinationConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_spin_interval(mut self, interval: Duration) -> Self {
        self.spin_interval = interval;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Reject values that would make locks unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "namespace_prefix must not be empty".to_string(),
            ));
        }
        if self.lock_ttl.is_zero() {
            return Err(ConfigError::Invalid("lock_ttl must be positive".to_string()));
        }
        if self.spin_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "spin_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Build a store key under the configured prefix
    pub fn key(&self, kind: &str, name: &str) -> String {
        format!("{}:{}:{}", self.namespace_prefix, kind, name)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
