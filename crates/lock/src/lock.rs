// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The capability shared by every lock primitive

use crate::error::LockError;
use crate::release::Release;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Per-call acquisition policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockOptions {
    /// Fail with `CouldNotLock` instead of waiting
    pub fail_fast: bool,
    /// Give up with `Timeout` after waiting this long
    pub timeout: Option<Duration>,
}

impl LockOptions {
    pub fn fail_fast() -> Self {
        Self {
            fail_fast: true,
            timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            fail_fast: false,
            timeout: Some(timeout),
        }
    }

    /// Options for a nested wait that has to finish by the caller's deadline
    pub(crate) fn until(fail_fast: bool, deadline: Option<Instant>) -> Self {
        Self {
            fail_fast,
            timeout: deadline.map(|d| d.saturating_duration_since(Instant::now())),
        }
    }

    /// Use `fallback` when no per-call timeout was given
    pub(crate) fn or_timeout(mut self, fallback: Option<Duration>) -> Self {
        if self.timeout.is_none() {
            self.timeout = fallback;
        }
        self
    }
}

/// Something that can be locked and yields a single-use `Release`
#[async_trait]
pub trait Lock: Send + Sync {
    fn name(&self) -> &str;

    async fn acquire(&self, options: LockOptions) -> Result<Release, LockError>;

    /// Wait for the lock
    async fn lock(&self) -> Result<Release, LockError> {
        self.acquire(LockOptions::default()).await
    }

    /// Take the lock only if it is free right now
    async fn try_lock(&self) -> Result<Release, LockError> {
        self.acquire(LockOptions::fail_fast()).await
    }

    /// Whether an acquisition would have to wait
    async fn is_locked(&self) -> Result<bool, LockError>;
}
