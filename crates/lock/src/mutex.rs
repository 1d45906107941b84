// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary lock
//!
//! A local `Mutex` hands the lock straight to the earliest queued waiter on
//! release, so waiters are served FIFO and never re-contend. A distributed
//! `Mutex` writes a per-attempt token under its key with NX and a TTL; the
//! TTL reclaims the lock if its holder goes away without releasing.

use crate::activity::Activity;
use crate::error::LockError;
use crate::lock::{Lock, LockOptions};
use crate::release::Release;
use crate::spin::spin;
use async_trait::async_trait;
use cosync_core::{CoordinationConfig, IdGen, SetOptions, SharedStore, UuidIdGen};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

/// Settings for a distributed `Mutex`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutexConfig {
    pub name: String,
    pub namespace_prefix: String,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub spin_interval: Duration,
    /// Used when a call passes no timeout of its own
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for MutexConfig {
    fn default() -> Self {
        Self::from_coordination("", &CoordinationConfig::default())
    }
}

impl MutexConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_coordination(name: impl Into<String>, config: &CoordinationConfig) -> Self {
        Self {
            name: name.into(),
            namespace_prefix: config.namespace_prefix.clone(),
            ttl: config.lock_ttl,
            spin_interval: config.spin_interval,
            timeout: config.lock_timeout,
        }
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

    /// Store key holding the current holder's token
    pub fn key(&self) -> String {
        format!("{}:mutex:{}", self.namespace_prefix, self.name)
    }

    fn validate(&self) -> Result<(), LockError> {
        if self.name.is_empty() {
            return Err(LockError::InvalidConfiguration(
                "a distributed mutex needs a name".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(LockError::InvalidConfiguration(format!(
                "mutex {} needs a positive ttl",
                self.name
            )));
        }
        if self.spin_interval.is_zero() {
            return Err(LockError::InvalidConfiguration(format!(
                "mutex {} needs a positive spin interval",
                self.name
            )));
        }
        Ok(())
    }
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct LocalState {
    locked: bool,
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

struct Distributed {
    store: SharedStore,
    key: String,
    ttl: Duration,
    spin_interval: Duration,
    timeout: Option<Duration>,
    id_gen: Arc<dyn IdGen>,
}

enum Mode {
    Local(StdMutex<LocalState>),
    Distributed(Distributed),
}

struct MutexInner {
    name: String,
    mode: Mode,
    activity: Activity,
}

/// Binary lock, local or store-backed
///
/// Clones share the same lock.
#[derive(Clone)]
pub struct Mutex {
    inner: Arc<MutexInner>,
}

impl std::fmt::Debug for Mutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutex")
            .field("name", &self.inner.name)
            .field("distributed", &self.is_distributed())
            .finish()
    }
}

impl Mutex {
    /// In-process lock with FIFO hand-off
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_mode(name.into(), Mode::Local(StdMutex::default()))
    }

    /// Lock shared by every process using `store`
    pub fn distributed(store: SharedStore, config: MutexConfig) -> Result<Self, LockError> {
        Self::distributed_with_ids(store, config, Arc::new(UuidIdGen))
    }

    /// Like [`Mutex::distributed`] with a custom token generator
    pub fn distributed_with_ids(
        store: SharedStore,
        config: MutexConfig,
        id_gen: Arc<dyn IdGen>,
    ) -> Result<Self, LockError> {
        config.validate()?;
        let mode = Mode::Distributed(Distributed {
            store,
            key: config.key(),
            ttl: config.ttl,
            spin_interval: config.spin_interval,
            timeout: config.timeout,
            id_gen,
        });
        Ok(Self::from_mode(config.name, mode))
    }

    fn from_mode(name: String, mode: Mode) -> Self {
        Self {
            inner: Arc::new(MutexInner {
                name,
                mode,
                activity: Activity::new(),
            }),
        }
    }

    pub fn is_distributed(&self) -> bool {
        matches!(self.inner.mode, Mode::Distributed(_))
    }

    /// Holders and waiters currently outstanding on this lock
    pub fn activity(&self) -> &Activity {
        &self.inner.activity
    }

    async fn acquire_local(&self, options: LockOptions) -> Result<Release, LockError> {
        let Mode::Local(state) = &self.inner.mode else {
            return Err(LockError::InvalidConfiguration(
                "mutex is not local".to_string(),
            ));
        };
        let name = &self.inner.name;

        let (id, rx) = {
            let mut state = lock_state(state);
            if !state.locked {
                state.locked = true;
                tracing::debug!(name, "lock acquired");
                return Ok(self.local_release());
            }
            if options.fail_fast {
                return Err(LockError::could_not_lock(name));
            }
            let id = state.next_id;
            state.next_id += 1;
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(Waiter { id, tx });
            tracing::debug!(name, waiter = id, queued = state.waiters.len(), "waiting for lock");
            (id, rx)
        };

        let _busy = self.inner.activity.hold();
        let mut pending = Pending {
            inner: &self.inner,
            id,
            rx,
            armed: true,
        };
        let started = tokio::time::Instant::now();
        let handed = match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, &mut pending.rx).await.ok(),
            None => Some((&mut pending.rx).await),
        };
        pending.armed = false;

        match handed {
            Some(Ok(())) => Ok(self.local_release()),
            // Senders are only dropped after a send or by the waiter itself
            Some(Err(_)) => Err(LockError::could_not_lock(name)),
            None if pending.withdraw() => {
                tracing::debug!(name, waiter = id, "hand-off raced the deadline, keeping lock");
                Ok(self.local_release())
            }
            None => {
                tracing::debug!(name, waiter = id, "timed out waiting for lock");
                Err(LockError::timeout(name, started.elapsed()))
            }
        }
    }

    fn local_release(&self) -> Release {
        let inner = Arc::clone(&self.inner);
        let busy = self.inner.activity.hold();
        Release::immediate(&self.inner.name, move || {
            release_local(&inner);
            drop(busy);
        })
    }

    async fn acquire_distributed(&self, options: LockOptions) -> Result<Release, LockError> {
        let Mode::Distributed(dist) = &self.inner.mode else {
            return Err(LockError::InvalidConfiguration(
                "mutex is not distributed".to_string(),
            ));
        };
        let name = self.inner.name.as_str();
        let _busy = self.inner.activity.hold();
        let options = options.or_timeout(dist.timeout);

        let token = spin(name, &options, dist.spin_interval, move |_| {
            dist.try_lock(name)
        })
        .await?;
        tracing::debug!(name, key = %dist.key, token = %token, "distributed lock acquired");

        let store = Arc::clone(&dist.store);
        let key = dist.key.clone();
        let name = name.to_string();
        let busy = self.inner.activity.hold();
        Ok(Release::deferred(&self.inner.name, move || async move {
            // TTL expiry reclaims the key if this delete is lost
            if let Err(e) = store.del(&key).await {
                tracing::warn!(name = %name, key = %key, error = %e, "failed to delete lock key");
            }
            drop(busy);
            Ok(())
        }))
    }
}

impl Distributed {
    async fn try_lock(&self, name: &str) -> Result<String, LockError> {
        let token = self.id_gen.token();
        let options = SetOptions::not_exists().with_expiry(self.ttl);
        self.store
            .set(&self.key, Value::String(token.clone()), options)
            .await?;
        match self.store.get(&self.key).await? {
            Some(Value::String(holder)) if holder == token => Ok(token),
            _ => Err(LockError::could_not_lock(name)),
        }
    }
}

fn lock_state(state: &StdMutex<LocalState>) -> MutexGuard<'_, LocalState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Give the lock to the earliest live waiter, or unlock
fn release_local(inner: &MutexInner) {
    let Mode::Local(state) = &inner.mode else {
        return;
    };
    let mut state = lock_state(state);
    while let Some(waiter) = state.waiters.pop_front() {
        if waiter.tx.send(()).is_ok() {
            tracing::debug!(name = %inner.name, waiter = waiter.id, "lock handed off");
            return;
        }
    }
    state.locked = false;
    tracing::debug!(name = %inner.name, "lock released");
}

/// A queued local waiter; withdraws itself if dropped before resolving
struct Pending<'a> {
    inner: &'a MutexInner,
    id: u64,
    rx: oneshot::Receiver<()>,
    armed: bool,
}

impl Pending<'_> {
    /// Leave the queue; returns true if the lock was already handed over
    fn withdraw(&mut self) -> bool {
        let Mode::Local(state) = &self.inner.mode else {
            return false;
        };
        {
            let mut state = lock_state(state);
            if let Some(pos) = state.waiters.iter().position(|w| w.id == self.id) {
                state.waiters.remove(pos);
                return false;
            }
        }
        // Hand-offs send under the state lock, so a missing waiter was served
        self.rx.try_recv().is_ok()
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.armed && self.withdraw() {
            release_local(self.inner);
        }
    }
}

#[async_trait]
impl Lock for Mutex {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn acquire(&self, options: LockOptions) -> Result<Release, LockError> {
        match &self.inner.mode {
            Mode::Local(_) => self.acquire_local(options).await,
            Mode::Distributed(_) => self.acquire_distributed(options).await,
        }
    }

    async fn is_locked(&self) -> Result<bool, LockError> {
        match &self.inner.mode {
            Mode::Local(state) => Ok(lock_state(state).locked),
            Mode::Distributed(dist) => Ok(dist.store.get(&dist.key).await?.is_some()),
        }
    }
}

#[cfg(test)]
#[path = "mutex_tests.rs"]
mod tests;
