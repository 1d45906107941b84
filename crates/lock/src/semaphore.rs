// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counting lock
//!
//! An internal `Mutex` guards every read-modify-write of the `tokens_out`
//! counter. Releasing a token while callers are queued hands it straight to
//! the earliest one; the counter does not move, so a freed token can never
//! be stolen by a newcomer.

use crate::activity::Activity;
use crate::error::LockError;
use crate::lock::{Lock, LockOptions};
use crate::mutex::{Mutex, MutexConfig};
use crate::release::Release;
use async_trait::async_trait;
use cosync_core::{CoordinationConfig, SharedStore, State};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Settings for a store-backed `Semaphore`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemaphoreConfig {
    pub name: String,
    pub size: usize,
    pub namespace_prefix: String,
    /// Expiry of the internal guard's store key
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Also how often queued callers re-check the shared counter
    #[serde(with = "humantime_serde")]
    pub spin_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self::from_coordination("", 1, &CoordinationConfig::default())
    }
}

impl SemaphoreConfig {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            ..Self::default()
        }
    }

    pub fn from_coordination(
        name: impl Into<String>,
        size: usize,
        config: &CoordinationConfig,
    ) -> Self {
        Self {
            name: name.into(),
            size,
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

    /// Namespace of the shared `tokens_out` counter
    pub fn namespace(&self) -> String {
        format!("{}:semaphore:{}", self.namespace_prefix, self.name)
    }

    fn guard_config(&self) -> MutexConfig {
        MutexConfig {
            name: format!("{}:guard", self.name),
            namespace_prefix: self.namespace_prefix.clone(),
            ttl: self.ttl,
            spin_interval: self.spin_interval,
            timeout: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenCount {
    tokens_out: i64,
}

const TOKENS_OUT: &str = "tokens_out";

enum Tokens {
    Local(AtomicI64),
    Shared(State<TokenCount>),
}

impl Tokens {
    async fn out(&self) -> Result<i64, LockError> {
        match self {
            Self::Local(out) => Ok(out.load(Ordering::SeqCst)),
            Self::Shared(state) => Ok(state.get(TOKENS_OUT).await?),
        }
    }

    async fn take(&self, size: i64) -> Result<(), LockError> {
        let out = match self {
            Self::Local(out) => out.fetch_add(1, Ordering::SeqCst) + 1,
            Self::Shared(state) => state.incr(TOKENS_OUT).await?,
        };
        debug_assert!(out <= size, "tokens_out {out} exceeds size {size}");
        Ok(())
    }

    async fn give_back(&self) -> Result<(), LockError> {
        let out = match self {
            Self::Local(out) => out.fetch_sub(1, Ordering::SeqCst) - 1,
            Self::Shared(state) => state.decr(TOKENS_OUT).await?,
        };
        debug_assert!(out >= 0, "tokens_out fell below zero");
        Ok(())
    }
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct Queue {
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

struct SemaphoreInner {
    name: String,
    size: usize,
    guard: Mutex,
    tokens: Tokens,
    queue: StdMutex<Queue>,
    /// Set for shared semaphores, whose counter moves without local releases
    recheck: Option<Duration>,
    timeout: Option<Duration>,
    activity: Activity,
}

enum Grant {
    Now,
    Queued(u64, oneshot::Receiver<()>),
}

/// Counting lock with FIFO hand-off
///
/// Clones share the same semaphore.
#[derive(Clone)]
pub struct Semaphore {
    inner: Arc<SemaphoreInner>,
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore")
            .field("name", &self.inner.name)
            .field("size", &self.inner.size)
            .finish()
    }
}

impl Semaphore {
    /// In-process semaphore with `size` tokens
    pub fn new(size: usize) -> Result<Self, LockError> {
        Self::named("semaphore", size)
    }

    pub fn named(name: impl Into<String>, size: usize) -> Result<Self, LockError> {
        let name = name.into();
        check_size(&name, size)?;
        let guard = Mutex::new(format!("{name}:guard"));
        Ok(Self::build(
            name,
            size,
            guard,
            Tokens::Local(AtomicI64::new(0)),
            None,
            None,
        ))
    }

    /// Semaphore whose counter lives in `store`
    pub fn shared(store: SharedStore, config: SemaphoreConfig) -> Result<Self, LockError> {
        check_size(&config.name, config.size)?;
        let guard = Mutex::distributed(Arc::clone(&store), config.guard_config())?;
        let state = State::new(store, config.namespace(), TokenCount::default())?;
        Ok(Self::build(
            config.name,
            config.size,
            guard,
            Tokens::Shared(state),
            Some(config.spin_interval),
            config.timeout,
        ))
    }

    fn build(
        name: String,
        size: usize,
        guard: Mutex,
        tokens: Tokens,
        recheck: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(SemaphoreInner {
                name,
                size,
                guard,
                tokens,
                queue: StdMutex::default(),
                recheck,
                timeout,
                activity: Activity::new(),
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Tokens that could be granted right now
    pub async fn available(&self) -> Result<usize, LockError> {
        let out = self.inner.tokens.out().await?;
        Ok(self.inner.size.saturating_sub(out.max(0) as usize))
    }

    pub fn activity(&self) -> &Activity {
        &self.inner.activity
    }

    /// Grant a token now, or queue for one
    async fn grant_or_enqueue(&self, fail_fast: bool) -> Result<Grant, LockError> {
        let inner = &self.inner;
        let out = inner.tokens.out().await?;
        let queued = lock_queue(&inner.queue).waiters.len();
        if out < inner.size as i64 && queued == 0 {
            // Enqueues only happen under the guard we hold
            inner.tokens.take(inner.size as i64).await?;
            tracing::debug!(name = %inner.name, tokens_out = out + 1, "token granted");
            return Ok(Grant::Now);
        }
        if fail_fast {
            return Err(LockError::could_not_lock(&inner.name));
        }
        let mut queue = lock_queue(&inner.queue);
        let id = queue.next_id;
        queue.next_id += 1;
        let (tx, rx) = oneshot::channel();
        queue.waiters.push_back(Waiter { id, tx });
        tracing::debug!(name = %inner.name, waiter = id, queued = queue.waiters.len(), "waiting for token");
        Ok(Grant::Queued(id, rx))
    }

    /// How long a caller may wait for the internal guard
    fn guard_wait(&self, fail_fast: bool, deadline: Option<Instant>) -> LockOptions {
        match self.inner.tokens {
            // Only ever held across in-memory updates
            Tokens::Local(_) => LockOptions::default(),
            Tokens::Shared(_) => LockOptions::until(fail_fast, deadline),
        }
    }

    /// Claim a token for a queued caller that is next in line
    async fn claim_if_front(&self, id: u64, deadline: Option<Instant>) -> Result<bool, LockError> {
        let inner = &self.inner;
        let guard = match inner.guard.acquire(self.guard_wait(false, deadline)).await {
            Ok(guard) => guard,
            // Busy elsewhere; the next tick or the deadline decides
            Err(e) if e.gave_up() => return Ok(false),
            Err(e) => return Err(e),
        };
        let claimed = async {
            let front = lock_queue(&inner.queue).waiters.front().map(|w| w.id);
            if front != Some(id) || inner.tokens.out().await? >= inner.size as i64 {
                return Ok(false);
            }
            inner.tokens.take(inner.size as i64).await?;
            lock_queue(&inner.queue).waiters.retain(|w| w.id != id);
            tracing::debug!(name = %inner.name, waiter = id, "token freed elsewhere, claimed");
            Ok::<_, LockError>(true)
        }
        .await;
        guard.release().await?;
        claimed
    }

    fn token_release(&self) -> Release {
        let inner = Arc::clone(&self.inner);
        let busy = self.inner.activity.hold();
        Release::deferred(&self.inner.name, move || async move {
            let result = release_token(&inner).await;
            drop(busy);
            result
        })
    }
}

fn check_size(name: &str, size: usize) -> Result<(), LockError> {
    if size == 0 {
        return Err(LockError::InvalidConfiguration(format!(
            "semaphore {name} needs at least one token"
        )));
    }
    Ok(())
}

fn lock_queue(queue: &StdMutex<Queue>) -> MutexGuard<'_, Queue> {
    queue.lock().unwrap_or_else(|e| e.into_inner())
}

/// Hand a token to the earliest live waiter, or return it to the pool
async fn release_token(inner: &SemaphoreInner) -> Result<(), LockError> {
    let guard = inner.guard.lock().await?;
    let handed = {
        let mut queue = lock_queue(&inner.queue);
        let mut handed = None;
        while let Some(waiter) = queue.waiters.pop_front() {
            if waiter.tx.send(()).is_ok() {
                handed = Some(waiter.id);
                break;
            }
        }
        handed
    };
    let result = match handed {
        Some(id) => {
            tracing::debug!(name = %inner.name, waiter = id, "token handed off");
            Ok(())
        }
        None => {
            tracing::debug!(name = %inner.name, "token returned");
            inner.tokens.give_back().await
        }
    };
    guard.release().await?;
    result
}

/// A queued caller; withdraws itself if dropped before resolving
struct Pending<'a> {
    inner: &'a Arc<SemaphoreInner>,
    id: u64,
    rx: oneshot::Receiver<()>,
    armed: bool,
}

impl Pending<'_> {
    /// Leave the queue; returns true if a token was already handed over
    fn withdraw(&mut self) -> bool {
        self.armed = false;
        {
            let mut queue = lock_queue(&self.inner.queue);
            if let Some(pos) = queue.waiters.iter().position(|w| w.id == self.id) {
                queue.waiters.remove(pos);
                return false;
            }
        }
        self.rx.try_recv().is_ok()
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if !self.armed || !self.withdraw() {
            return;
        }
        let inner = Arc::clone(self.inner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = release_token(&inner).await {
                        tracing::warn!(name = %inner.name, error = %e, "failed to return token of cancelled waiter");
                    }
                });
            }
            Err(_) => {
                tracing::error!(name = %inner.name, "waiter cancelled outside a runtime, token leaked");
            }
        }
    }
}

#[async_trait]
impl Lock for Semaphore {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn acquire(&self, options: LockOptions) -> Result<Release, LockError> {
        let options = options.or_timeout(self.inner.timeout);
        let _busy = self.inner.activity.hold();
        let started = Instant::now();
        let deadline = options.timeout.map(|t| started + t);

        let guard = match self
            .inner
            .guard
            .acquire(self.guard_wait(options.fail_fast, deadline))
            .await
        {
            Ok(guard) => guard,
            Err(e) if e.is_contention() => return Err(LockError::could_not_lock(&self.inner.name)),
            Err(LockError::Timeout { .. }) => {
                return Err(LockError::timeout(&self.inner.name, started.elapsed()))
            }
            Err(e) => return Err(e),
        };
        let grant = self.grant_or_enqueue(options.fail_fast).await;
        guard.release().await?;

        let (id, rx) = match grant? {
            Grant::Now => return Ok(self.token_release()),
            Grant::Queued(id, rx) => (id, rx),
        };
        let mut queued = Pending {
            inner: &self.inner,
            id,
            rx,
            armed: true,
        };

        loop {
            let tick = async {
                match self.inner.recheck {
                    Some(interval) => tokio::time::sleep(interval).await,
                    None => std::future::pending::<()>().await,
                }
            };
            let expired = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                handed = &mut queued.rx => {
                    queued.armed = false;
                    return match handed {
                        Ok(()) => Ok(self.token_release()),
                        Err(_) => Err(LockError::could_not_lock(&self.inner.name)),
                    };
                }
                _ = tick => {
                    if self.claim_if_front(id, deadline).await? {
                        queued.armed = false;
                        return Ok(self.token_release());
                    }
                }
                _ = expired => {
                    if queued.withdraw() {
                        return Ok(self.token_release());
                    }
                    tracing::debug!(name = %self.inner.name, waiter = id, "timed out waiting for token");
                    return Err(LockError::timeout(&self.inner.name, started.elapsed()));
                }
            }
        }
    }

    /// True when no tokens remain
    async fn is_locked(&self) -> Result<bool, LockError> {
        Ok(self.inner.tokens.out().await? >= self.inner.size as i64)
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
