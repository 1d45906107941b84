// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for lock operations

use cosync_core::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while acquiring or releasing a lock
#[derive(Debug, Error)]
pub enum LockError {
    /// Fail-fast acquisition found the lock unavailable
    #[error("unable to obtain lock {name}")]
    CouldNotLock { name: String },
    /// Waited past the caller's deadline
    #[error("timed out after {waited:?} waiting for lock {name}")]
    Timeout { name: String, waited: Duration },
    /// A `Release` was used twice
    #[error("lock {name} has already been released")]
    AlreadyReleased { name: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LockError {
    pub(crate) fn could_not_lock(name: &str) -> Self {
        Self::CouldNotLock {
            name: name.to_string(),
        }
    }

    pub(crate) fn timeout(name: &str, waited: Duration) -> Self {
        Self::Timeout {
            name: name.to_string(),
            waited,
        }
    }

    /// The caller stopped waiting, either at once or at its deadline
    pub(crate) fn gave_up(&self) -> bool {
        matches!(self, Self::CouldNotLock { .. } | Self::Timeout { .. })
    }

    /// True for the outcome a spinning caller retries on
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::CouldNotLock { .. })
    }
}
