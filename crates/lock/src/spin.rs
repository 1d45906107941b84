// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spin-and-timeout retry for store-backed locks

use crate::error::LockError;
use crate::lock::LockOptions;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Retry `attempt` until it stops reporting contention
///
/// `attempt` receives the zero-based attempt number. Only `CouldNotLock` is
/// retried; any other error surfaces immediately. Fail-fast callers get
/// exactly one attempt.
pub(crate) async fn spin<T, F, Fut>(
    name: &str,
    options: &LockOptions,
    interval: Duration,
    mut attempt: F,
) -> Result<T, LockError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LockError>>,
{
    if options.fail_fast {
        return attempt(0).await;
    }

    let started = Instant::now();
    let deadline = options.timeout.map(|t| started + t);
    let mut n = 0u32;
    loop {
        match attempt(n).await {
            Err(e) if e.is_contention() => {}
            other => return other,
        }
        n = n.saturating_add(1);

        let now = Instant::now();
        let sleep = match deadline {
            Some(deadline) if now >= deadline => {
                tracing::debug!(name, attempts = n, "gave up spinning");
                return Err(LockError::timeout(name, now - started));
            }
            Some(deadline) => interval.min(deadline - now),
            None => interval,
        };
        tracing::trace!(name, attempt = n, "lock busy, spinning");
        tokio::time::sleep(sleep).await;
    }
}

#[cfg(test)]
#[path = "spin_tests.rs"]
mod tests;
