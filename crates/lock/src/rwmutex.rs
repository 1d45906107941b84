// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reader/writer lock with writer priority
//!
//! The lock's whole state lives in one `State` namespace and every
//! transition runs under an internal distributed `Mutex`. A writer that is
//! turned away bumps `write_attempts` the first time; while that mark is
//! set no new reader gets in, so a stream of readers cannot starve it.
//!
//! Waiting writers are not ordered among themselves. Whichever one retries
//! first after the lock frees up wins.

use crate::activity::Activity;
use crate::error::LockError;
use crate::lock::{Lock, LockOptions};
use crate::mutex::{Mutex, MutexConfig};
use crate::release::Release;
use crate::spin::spin;
use async_trait::async_trait;
use cosync_core::{CoordinationConfig, IdGen, MemoryStore, SharedStore, State, UuidIdGen};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const READER_COUNT: &str = "reader_count";
const WRITE_ATTEMPTS: &str = "write_attempts";
const WRITER_ID: &str = "writer_id";

/// Settings for an `RwMutex`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RwMutexConfig {
    /// Processes using the same namespace share the lock; `None` picks a
    /// fresh one
    pub namespace: Option<String>,
    pub namespace_prefix: String,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub spin_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for RwMutexConfig {
    fn default() -> Self {
        Self::from_coordination(&CoordinationConfig::default())
    }
}

impl RwMutexConfig {
    pub fn from_coordination(config: &CoordinationConfig) -> Self {
        Self {
            namespace: None,
            namespace_prefix: config.namespace_prefix.clone(),
            ttl: config.lock_ttl,
            spin_interval: config.spin_interval,
            timeout: config.lock_timeout,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_spin_interval(mut self, interval: Duration) -> Self {
        self.spin_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Snapshot of an `RwMutex`
///
/// `writer_id` set implies `reader_count == 0`, and the reverse.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RwState {
    pub reader_count: i64,
    pub write_attempts: i64,
    pub writer_id: Option<String>,
}

struct RwInner {
    name: String,
    guard: Mutex,
    state: State<RwState>,
    spin_interval: Duration,
    timeout: Option<Duration>,
    id_gen: Arc<dyn IdGen>,
    activity: Activity,
}

impl RwInner {
    /// Run one state transition under the internal mutex
    ///
    /// A guard wait cut short by `wait` reports contention on this lock, so
    /// the caller's own spin decides between retrying and timing out.
    async fn guarded<T>(
        &self,
        wait: LockOptions,
        transition: impl Future<Output = Result<T, LockError>>,
    ) -> Result<T, LockError> {
        let guard = match self.guard.acquire(wait).await {
            Ok(guard) => guard,
            Err(e) if e.gave_up() => return Err(LockError::could_not_lock(&self.name)),
            Err(e) => return Err(e),
        };
        let result = transition.await;
        guard.release().await?;
        result
    }

    async fn try_rlock(&self, wait: LockOptions) -> Result<(), LockError> {
        self.guarded(wait, async {
            let state = self.state.dump().await?;
            if state.writer_id.is_some() || state.write_attempts > 0 {
                return Err(LockError::could_not_lock(&self.name));
            }
            let readers = self.state.incr(READER_COUNT).await?;
            tracing::debug!(name = %self.name, readers, "read lock acquired");
            Ok(())
        })
        .await
    }

    async fn release_read(&self) -> Result<(), LockError> {
        self.guarded(LockOptions::default(), async {
            // A writer owning the namespace means this reader's hold expired
            if self.state.get::<Option<String>>(WRITER_ID).await?.is_none() {
                self.state.decr(READER_COUNT).await?;
            }
            Ok(())
        })
        .await
    }

    async fn try_wlock(
        &self,
        wait: LockOptions,
        token: &str,
        marked: &AtomicBool,
    ) -> Result<(), LockError> {
        self.guarded(wait, async {
            let state = self.state.dump().await?;
            if state.writer_id.is_some() || state.reader_count > 0 {
                if !marked.load(Ordering::SeqCst) {
                    let waiting = self.state.incr(WRITE_ATTEMPTS).await?;
                    marked.store(true, Ordering::SeqCst);
                    tracing::debug!(name = %self.name, waiting, "writer waiting, readers blocked");
                }
                return Err(LockError::could_not_lock(&self.name));
            }
            self.state.set(WRITER_ID, token).await?;
            tracing::debug!(name = %self.name, writer = token, "write lock acquired");
            Ok(())
        })
        .await
    }

    /// Take back a waiting writer's mark
    async fn withdraw_write_attempt(&self) -> Result<(), LockError> {
        self.guarded(LockOptions::default(), async {
            if self.state.get::<i64>(WRITE_ATTEMPTS).await? > 0 {
                self.state.decr(WRITE_ATTEMPTS).await?;
            }
            Ok(())
        })
        .await
    }

    async fn release_write(&self, token: &str) -> Result<(), LockError> {
        self.guarded(LockOptions::default(), async {
            let writer = self.state.get::<Option<String>>(WRITER_ID).await?;
            if writer.as_deref() == Some(token) {
                self.state.reset().await?;
            } else {
                tracing::warn!(name = %self.name, writer = token, "write lock was taken over before release");
            }
            Ok(())
        })
        .await
    }
}

/// Reader/writer lock
///
/// The `Lock` impl is the write side; [`RwMutex::rlocker`] gives the read
/// side as a `Lock`. Clones share the same lock.
#[derive(Clone)]
pub struct RwMutex {
    inner: Arc<RwInner>,
}

impl std::fmt::Debug for RwMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwMutex")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl RwMutex {
    /// In-process lock on a private store
    pub fn new() -> Result<Self, LockError> {
        Self::with_store(Arc::new(MemoryStore::new()), RwMutexConfig::default())
    }

    pub fn with_store(store: SharedStore, config: RwMutexConfig) -> Result<Self, LockError> {
        Self::with_store_and_ids(store, config, Arc::new(UuidIdGen))
    }

    pub fn with_store_and_ids(
        store: SharedStore,
        config: RwMutexConfig,
        id_gen: Arc<dyn IdGen>,
    ) -> Result<Self, LockError> {
        let namespace = match config.namespace {
            Some(ref namespace) if !namespace.is_empty() => namespace.clone(),
            Some(_) => {
                return Err(LockError::InvalidConfiguration(
                    "rwmutex namespace must not be empty".to_string(),
                ))
            }
            None => id_gen.token(),
        };
        let guard = Mutex::distributed(
            Arc::clone(&store),
            MutexConfig {
                name: format!("rwmux:{namespace}"),
                namespace_prefix: config.namespace_prefix.clone(),
                ttl: config.ttl,
                spin_interval: config.spin_interval,
                timeout: None,
            },
        )?;
        let state = State::new(
            store,
            format!("{}:rwmux:{}", config.namespace_prefix, namespace),
            RwState::default(),
        )?;
        Ok(Self {
            inner: Arc::new(RwInner {
                name: namespace,
                guard,
                state,
                spin_interval: config.spin_interval,
                timeout: config.timeout,
                id_gen,
                activity: Activity::new(),
            }),
        })
    }

    /// Namespace shared by every handle on this lock
    pub fn namespace(&self) -> &str {
        &self.inner.name
    }

    pub fn activity(&self) -> &Activity {
        &self.inner.activity
    }

    /// Current reader count, writer and waiting-writer marks
    pub async fn state(&self) -> Result<RwState, LockError> {
        Ok(self.inner.state.dump().await?)
    }

    pub async fn rlock(&self, options: LockOptions) -> Result<Release, LockError> {
        let inner = &*self.inner;
        let _busy = inner.activity.hold();
        let options = options.or_timeout(inner.timeout);
        let deadline = options.timeout.map(|t| Instant::now() + t);
        spin(&inner.name, &options, inner.spin_interval, move |_| {
            inner.try_rlock(LockOptions::until(options.fail_fast, deadline))
        })
        .await?;

        let held = Arc::clone(&self.inner);
        let busy = inner.activity.hold();
        Ok(Release::deferred(&inner.name, move || async move {
            let result = held.release_read().await;
            drop(busy);
            result
        }))
    }

    pub async fn wlock(&self, options: LockOptions) -> Result<Release, LockError> {
        let inner = &*self.inner;
        let _busy = inner.activity.hold();
        let options = options.or_timeout(inner.timeout);
        let deadline = options.timeout.map(|t| Instant::now() + t);
        let token = inner.id_gen.token();
        let marked = AtomicBool::new(false);

        let acquired = {
            let token = token.as_str();
            let marked = &marked;
            spin(&inner.name, &options, inner.spin_interval, move |_| {
                inner.try_wlock(LockOptions::until(options.fail_fast, deadline), token, marked)
            })
            .await
        };
        if let Err(e) = acquired {
            if marked.load(Ordering::SeqCst) {
                if let Err(withdraw) = inner.withdraw_write_attempt().await {
                    tracing::warn!(name = %inner.name, error = %withdraw, "failed to withdraw write attempt");
                }
            }
            return Err(e);
        }

        let held = Arc::clone(&self.inner);
        let busy = inner.activity.hold();
        Ok(Release::deferred(&inner.name, move || async move {
            let result = held.release_write(&token).await;
            drop(busy);
            result
        }))
    }

    /// The read side as a `Lock`
    pub fn rlocker(&self) -> ReadLocker {
        ReadLocker {
            name: format!("{}:read", self.inner.name),
            rw: self.clone(),
        }
    }
}

#[async_trait]
impl Lock for RwMutex {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn acquire(&self, options: LockOptions) -> Result<Release, LockError> {
        self.wlock(options).await
    }

    /// True while a writer or any reader holds the lock
    async fn is_locked(&self) -> Result<bool, LockError> {
        let state = self.state().await?;
        Ok(state.writer_id.is_some() || state.reader_count > 0)
    }
}

/// Read side of an [`RwMutex`]
#[derive(Clone, Debug)]
pub struct ReadLocker {
    name: String,
    rw: RwMutex,
}

#[async_trait]
impl Lock for ReadLocker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, options: LockOptions) -> Result<Release, LockError> {
        self.rw.rlock(options).await
    }

    /// True while a reader would be turned away
    async fn is_locked(&self) -> Result<bool, LockError> {
        let state = self.rw.state().await?;
        Ok(state.writer_id.is_some() || state.write_attempts > 0)
    }
}

#[cfg(test)]
#[path = "rwmutex_tests.rs"]
mod tests;
