// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::ResilienceError;
use std::future::Future;
use std::time::Duration;

/// Fail with `Timeout` if `work` has not finished within `limit`
///
/// `work` is dropped on expiry, which releases any lock or channel wait it
/// was holding.
pub async fn with_timeout<T, E, Fut>(limit: Duration, work: Fut) -> Result<T, ResilienceError<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, work).await {
        Ok(outcome) => outcome.map_err(ResilienceError::Inner),
        Err(_) => {
            tracing::debug!(?limit, "call timed out");
            Err(ResilienceError::Timeout(limit))
        }
    }
}
