// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker over a store-backed failure record
//!
//! Every breaker with the same name and store shares one record, so a
//! failing dependency trips the breaker for every process at once. The
//! breaker only reads and bumps fields of its `State`; it takes no locks.

use crate::error::ResilienceError;
use cosync_core::{Clock, CoordinationConfig, SharedStore, State, SystemClock};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

const NUM_ERRORS: &str = "num_errors";
const LAST_ERROR: &str = "last_error";
const LAST_ERROR_TIME: &str = "last_error_time";

/// Settings for a `CircuitBreaker`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub name: String,
    pub namespace_prefix: String,
    /// Failures in a row that stop calls from flowing
    pub max_errors: i64,
    /// How long to reject calls before letting a trial call through
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::from_coordination("", &CoordinationConfig::default())
    }
}

impl BreakerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_coordination(name: impl Into<String>, config: &CoordinationConfig) -> Self {
        Self {
            name: name.into(),
            namespace_prefix: config.namespace_prefix.clone(),
            max_errors: 10,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_max_errors(mut self, max_errors: i64) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn namespace(&self) -> String {
        format!("{}:breaker:{}", self.namespace_prefix, self.name)
    }
}

/// Failure record shared through the store
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerRecord {
    pub num_errors: i64,
    pub last_error: Option<String>,
    /// Milliseconds since the Unix epoch
    pub last_error_time: u64,
}

/// Where a breaker stands
///
/// Named after the dependency: `Open` means calls flow through to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Open,
    /// Too many failures; calls are rejected
    Closed,
    /// Rejecting, but the timeout passed, so one trial call may go through
    HalfOpen,
}

pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    record: State<BreakerRecord>,
    max_errors: i64,
    timeout: Duration,
    clock: C,
}

impl<C: Clock> std::fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("max_errors", &self.max_errors)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    pub fn new(store: SharedStore, config: BreakerConfig) -> Result<Self, ResilienceError<()>> {
        Self::with_clock(store, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    pub fn with_clock(
        store: SharedStore,
        config: BreakerConfig,
        clock: C,
    ) -> Result<Self, ResilienceError<()>> {
        if config.name.is_empty() || config.max_errors < 1 {
            return Err(ResilienceError::InvalidConfiguration(format!(
                "breaker needs a name and max_errors >= 1, got {:?} and {}",
                config.name, config.max_errors
            )));
        }
        let record = State::new(store, config.namespace(), BreakerRecord::default())?;
        Ok(Self {
            name: config.name,
            record,
            max_errors: config.max_errors,
            timeout: config.timeout,
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn record(&self) -> Result<BreakerRecord, ResilienceError<()>> {
        Ok(self.record.dump().await?)
    }

    pub async fn state(&self) -> Result<BreakerState, ResilienceError<()>> {
        let record = self.record.dump().await?;
        Ok(self.classify(&record))
    }

    fn classify(&self, record: &BreakerRecord) -> BreakerState {
        if record.num_errors < self.max_errors {
            return BreakerState::Open;
        }
        let since = self
            .clock
            .epoch_millis()
            .saturating_sub(record.last_error_time);
        if u128::from(since) >= self.timeout.as_millis() {
            BreakerState::HalfOpen
        } else {
            BreakerState::Closed
        }
    }

    /// Run `call` unless the breaker is rejecting calls
    pub async fn call<T, E, F, Fut>(&self, call: F) -> Result<T, ResilienceError<E>>
    where
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let record = self.record.dump().await?;
        match self.classify(&record) {
            BreakerState::Open => {}
            BreakerState::Closed => {
                tracing::debug!(breaker = %self.name, errors = record.num_errors, "call rejected");
                return Err(ResilienceError::Rejected {
                    name: self.name.clone(),
                });
            }
            BreakerState::HalfOpen => {
                // Push the window forward so concurrent callers stay rejected
                self.record
                    .set(LAST_ERROR_TIME, self.clock.epoch_millis())
                    .await?;
                tracing::info!(breaker = %self.name, "trial call");
            }
        }

        match call().await {
            Ok(value) => {
                if record.num_errors > 0 {
                    self.record.reset().await?;
                    tracing::info!(breaker = %self.name, "call succeeded, failures cleared");
                }
                Ok(value)
            }
            Err(e) => {
                let errors = self.record.incr(NUM_ERRORS).await?;
                self.record.set(LAST_ERROR, e.to_string()).await?;
                self.record
                    .set(LAST_ERROR_TIME, self.clock.epoch_millis())
                    .await?;
                if errors >= self.max_errors {
                    tracing::warn!(breaker = %self.name, errors, error = %e, "breaker rejecting calls");
                } else {
                    tracing::debug!(breaker = %self.name, errors, error = %e, "call failed");
                }
                Err(ResilienceError::Inner(e))
            }
        }
    }

    /// Forget every recorded failure
    pub async fn reset(&self) -> Result<(), ResilienceError<()>> {
        Ok(self.record.reset().await?)
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
