// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency limit around an async worker

use crate::error::ResilienceError;
use cosync_core::SharedStore;
use cosync_lock::{Lock, LockOptions, Semaphore, SemaphoreConfig};
use std::future::Future;
use std::time::Duration;

/// Runs at most `size` calls at once; the rest queue or are turned away
#[derive(Clone, Debug)]
pub struct Bulkhead {
    semaphore: Semaphore,
    options: LockOptions,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, size: usize) -> Result<Self, ResilienceError<()>> {
        Ok(Self::from_semaphore(Semaphore::named(name, size)?))
    }

    /// Bulkhead whose limit is shared by every process using `store`
    pub fn shared(store: SharedStore, config: SemaphoreConfig) -> Result<Self, ResilienceError<()>> {
        Ok(Self::from_semaphore(Semaphore::shared(store, config)?))
    }

    pub fn from_semaphore(semaphore: Semaphore) -> Self {
        Self {
            semaphore,
            options: LockOptions::default(),
        }
    }

    /// Reject calls instead of queueing them when full
    pub fn with_fail_fast(mut self) -> Self {
        self.options.fail_fast = true;
        self
    }

    /// Give up on a queued call after `timeout`
    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        self.semaphore.name()
    }

    /// Calls that could start right now
    pub async fn available(&self) -> Result<usize, ResilienceError<()>> {
        Ok(self.semaphore.available().await?)
    }

    /// Run `work` once a slot is free
    pub async fn run<T, E, F, Fut>(&self, work: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let slot = self.semaphore.acquire(self.options).await?;
        tracing::trace!(bulkhead = self.name(), "slot taken");
        let outcome = work().await;
        slot.release().await?;
        outcome.map_err(ResilienceError::Inner)
    }
}

#[cfg(test)]
#[path = "bulkhead_tests.rs"]
mod tests;
