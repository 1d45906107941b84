// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cosync_core::StoreError;
use cosync_lock::LockError;
use std::time::Duration;
use thiserror::Error;

/// Errors from a guarded call; `Inner` carries the call's own error
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The breaker is rejecting calls
    #[error("circuit breaker {name} is rejecting calls")]
    Rejected { name: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("{0}")]
    Inner(E),
}

impl<E> ResilienceError<E> {
    /// The call's own error, if that is what this is
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitGroupError {
    #[error("wait group counter would drop below zero")]
    NegativeCounter,
    #[error("timed out waiting for wait group")]
    Timeout,
    #[error("waited task failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("scope was cancelled")]
    Cancelled,
    #[error("scoped task panicked: {0}")]
    Panicked(String),
}
