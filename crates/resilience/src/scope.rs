// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellable work with deferred cleanups
//!
//! Cleanups registered with [`Scope::defer`] run in registration order when
//! the work finishes, fails, panics, is cancelled, or is dropped. They run
//! from a drop guard, so no exit path can skip them.

use crate::error::ScopeError;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Cleanup = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Cleanups {
    pending: Vec<Cleanup>,
    exited: bool,
}

struct ScopeInner {
    cleanups: Mutex<Cleanups>,
    cancelled: watch::Sender<bool>,
}

/// Handle to a running unit of work
///
/// Clones refer to the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Scope {
    fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            inner: Arc::new(ScopeInner {
                cleanups: Mutex::default(),
                cancelled,
            }),
        }
    }

    /// Run `work` in a fresh scope on the current task
    pub async fn run<T, F, Fut>(work: F) -> Result<T, ScopeError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = T>,
    {
        let scope = Scope::new();
        let _exit = ExitGuard(Arc::clone(&scope.inner));
        let work = work(scope.clone());
        tokio::select! {
            biased;
            outcome = work => Ok(outcome),
            _ = scope.cancelled() => Err(ScopeError::Cancelled),
        }
    }

    /// Run `work` in a fresh scope on its own task
    pub fn spawn<T, F, Fut>(work: F) -> ScopedTask<T>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let scope = Scope::new();
        let exit = ExitGuard(Arc::clone(&scope.inner));
        let work = work(scope.clone());
        let watcher = scope.clone();
        let handle = tokio::spawn(async move {
            let _exit = exit;
            tokio::select! {
                biased;
                outcome = work => Ok(outcome),
                _ = watcher.cancelled() => Err(ScopeError::Cancelled),
            }
        });
        ScopedTask { scope, handle }
    }

    /// Register a cleanup; runs now if the scope already exited
    pub fn defer(&self, cleanup: impl FnOnce() + Send + 'static) {
        let mut cleanups = self
            .inner
            .cleanups
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if cleanups.exited {
            drop(cleanups);
            cleanup();
            return;
        }
        cleanups.pending.push(Box::new(cleanup));
    }

    pub fn cancel(&self) {
        self.inner.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.borrow()
    }

    /// Resolve once the scope is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancelled.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Runs a scope's cleanups when its work exits
struct ExitGuard(Arc<ScopeInner>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let pending = {
            let mut cleanups = self.0.cleanups.lock().unwrap_or_else(|e| e.into_inner());
            cleanups.exited = true;
            std::mem::take(&mut cleanups.pending)
        };
        if !pending.is_empty() {
            tracing::trace!(cleanups = pending.len(), "running deferred cleanups");
        }
        for cleanup in pending {
            cleanup();
        }
    }
}

/// A scope running on its own task
#[derive(Debug)]
pub struct ScopedTask<T> {
    scope: Scope,
    handle: JoinHandle<Result<T, ScopeError>>,
}

impl<T> ScopedTask<T> {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Stop the work at its next suspension point
    pub fn cancel(&self) {
        self.scope.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> Result<T, ScopeError> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(ScopeError::Cancelled),
            Err(e) => Err(ScopeError::Panicked(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
