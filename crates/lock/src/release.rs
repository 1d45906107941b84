// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-use release handles

use crate::error::LockError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

pub(crate) type ReleaseFuture = Pin<Box<dyn Future<Output = Result<(), LockError>> + Send>>;

enum Action {
    /// Runs synchronously (local hand-off)
    Immediate(Box<dyn FnOnce() + Send>),
    /// Needs the store or an internal lock
    Deferred(Box<dyn FnOnce() -> ReleaseFuture + Send>),
}

/// Releases whatever `Lock::acquire` granted
///
/// Must be released exactly once; a second `release` fails with
/// `AlreadyReleased`. A handle dropped without being released gives the lock
/// back on its own (asynchronous releases are spawned on the current tokio
/// runtime) and logs a warning.
pub struct Release {
    name: String,
    action: Mutex<Option<Action>>,
}

impl Release {
    pub(crate) fn immediate(name: &str, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.to_string(),
            action: Mutex::new(Some(Action::Immediate(Box::new(release)))),
        }
    }

    pub(crate) fn deferred<F, Fut>(name: &str, release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), LockError>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            action: Mutex::new(Some(Action::Deferred(Box::new(move || {
                Box::pin(release()) as ReleaseFuture
            })))),
        }
    }

    /// Name of the lock this handle releases
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_released(&self) -> bool {
        self.action
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    pub async fn release(&self) -> Result<(), LockError> {
        let action = self
            .action
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match action {
            None => Err(LockError::AlreadyReleased {
                name: self.name.clone(),
            }),
            Some(Action::Immediate(release)) => {
                release();
                Ok(())
            }
            Some(Action::Deferred(release)) => release().await,
        }
    }
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        let action = self
            .action
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match action {
            None => {}
            Some(Action::Immediate(release)) => {
                tracing::warn!(name = %self.name, "lock released by drop");
                release();
            }
            Some(Action::Deferred(release)) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    tracing::warn!(name = %self.name, "lock released by drop");
                    let name = self.name.clone();
                    handle.spawn(async move {
                        if let Err(e) = release().await {
                            tracing::warn!(name = %name, error = %e, "release after drop failed");
                        }
                    });
                }
                Err(_) => {
                    tracing::error!(name = %self.name, "release dropped outside a runtime, lock leaked");
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "release_tests.rs"]
mod tests;
