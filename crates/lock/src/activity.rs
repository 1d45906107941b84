// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keep-alive accounting for outstanding lock requests

use std::sync::Arc;
use tokio::sync::watch;

/// Counts holders and waiters of a lock
///
/// A host that must not exit while a lock is queued or held awaits
/// [`Activity::wait_idle`]. Clones share the same counter.
#[derive(Clone, Debug)]
pub struct Activity {
    count: Arc<watch::Sender<usize>>,
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

impl Activity {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Register one outstanding request until the guard drops
    pub fn hold(&self) -> ActivityGuard {
        self.count.send_modify(|n| *n += 1);
        ActivityGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn outstanding(&self) -> usize {
        *self.count.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    /// Resolve once nothing is queued or held
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Keeps an [`Activity`] busy while alive
#[derive(Debug)]
pub struct ActivityGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
