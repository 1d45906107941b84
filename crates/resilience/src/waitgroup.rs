// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wait for a set of counts and tasks to finish

use crate::error::WaitGroupError;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Something a `WaitGroup` can wait on
pub enum Waitable {
    /// Adjust the counter; pair positive counts with `done`
    Count(i64),
    /// Count a running task until it finishes
    Deferred(JoinHandle<()>),
    /// Produce the waitable when it is added
    Factory(Box<dyn FnOnce() -> Waitable + Send>),
}

impl Waitable {
    pub fn factory(make: impl FnOnce() -> Waitable + Send + 'static) -> Self {
        Self::Factory(Box::new(make))
    }
}

impl fmt::Debug for Waitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => f.debug_tuple("Count").field(n).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Counter that resolves waiters once it reaches zero
///
/// Clones share the same group.
#[derive(Clone, Debug)]
pub struct WaitGroup {
    count: Arc<watch::Sender<i64>>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
            failures: Arc::default(),
        }
    }

    pub fn count(&self) -> i64 {
        *self.count.borrow()
    }

    pub fn add(&self, waitable: Waitable) -> Result<(), WaitGroupError> {
        match waitable {
            Waitable::Count(n) => self.adjust(n),
            Waitable::Deferred(task) => {
                let runtime = tokio::runtime::Handle::try_current()
                    .map_err(|e| WaitGroupError::Failed(e.to_string()))?;
                self.adjust(1)?;
                let group = self.clone();
                runtime.spawn(async move {
                    if let Err(e) = task.await {
                        tracing::warn!(error = %e, "waited task failed");
                        group
                            .failures
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .push(e.to_string());
                    }
                    // Cannot go negative: this task's own increment is still counted
                    let _ = group.adjust(-1);
                });
                Ok(())
            }
            Waitable::Factory(make) => self.add(make()),
        }
    }

    /// Mark one counted unit finished
    pub fn done(&self) -> Result<(), WaitGroupError> {
        self.adjust(-1)
    }

    fn adjust(&self, delta: i64) -> Result<(), WaitGroupError> {
        let mut outcome = Ok(());
        self.count.send_if_modified(|count| {
            let next = *count + delta;
            if next < 0 {
                outcome = Err(WaitGroupError::NegativeCounter);
                return false;
            }
            if *count == 0 && next > 0 {
                // A new round starts; earlier failures belonged to the last one
                self.failures
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clear();
            }
            *count = next;
            delta != 0
        });
        outcome
    }

    /// Wait for the counter to reach zero
    ///
    /// Fails with `Failed` if a task waited on since the counter last left
    /// zero panicked or was cancelled.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<(), WaitGroupError> {
        let mut rx = self.count.subscribe();
        let idle = rx.wait_for(|n| *n == 0);
        let reached = match timeout {
            Some(limit) => tokio::time::timeout(limit, idle)
                .await
                .map_err(|_| WaitGroupError::Timeout)?,
            None => idle.await,
        };
        // The sender lives in `self`, so the channel cannot close here
        drop(reached);

        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        if failures.is_empty() {
            Ok(())
        } else {
            Err(WaitGroupError::Failed(failures.join("; ")))
        }
    }
}

#[cfg(test)]
#[path = "waitgroup_tests.rs"]
mod tests;
