// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced store wrapper for consistent observability

use super::{Command, Reply, SetOptions, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Wrapper that adds tracing to any Store
#[derive(Clone)]
pub struct TracedStore<S> {
    inner: S,
}

impl<S> TracedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn log_outcome<T>(result: &Result<T, StoreError>, started: Instant) {
    let elapsed_us = started.elapsed().as_micros() as u64;
    match result {
        Ok(_) => tracing::trace!(elapsed_us, "ok"),
        Err(e) => tracing::warn!(elapsed_us, error = %e, "failed"),
    }
}

#[async_trait]
impl<S: Store> Store for TracedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let started = Instant::now();
        let result = self
            .inner
            .get(key)
            .instrument(tracing::info_span!("store.get", key))
            .await;
        tracing::trace!(key, hit = ?result.as_ref().map(|v| v.is_some()).ok(), "read");
        log_outcome(&result, started);
        result
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<bool, StoreError> {
        let span = tracing::info_span!(
            "store.set",
            key,
            nx = options.not_exists,
            ttl_ms = options.expires.map(|d| d.as_millis() as u64)
        );
        async {
            let started = Instant::now();
            let result = self.inner.set(key, value, options).await;
            if let Ok(false) = result {
                tracing::debug!("key present, not written");
            }
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        async {
            let started = Instant::now();
            let result = self.inner.del(key).await;
            log_outcome(&result, started);
            result
        }
        .instrument(tracing::info_span!("store.del", key))
        .await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let result = self
            .inner
            .incr(key)
            .instrument(tracing::info_span!("store.incr", key))
            .await;
        tracing::trace!(key, value = ?result.as_ref().ok(), "incr");
        result
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        let result = self
            .inner
            .decr(key)
            .instrument(tracing::info_span!("store.decr", key))
            .await;
        tracing::trace!(key, value = ?result.as_ref().ok(), "decr");
        result
    }

    async fn hget(&self, namespace: &str, field: &str) -> Result<Option<Value>, StoreError> {
        self.inner
            .hget(namespace, field)
            .instrument(tracing::info_span!("store.hget", namespace, field))
            .await
    }

    async fn hset(&self, namespace: &str, field: &str, value: Value) -> Result<(), StoreError> {
        async {
            let started = Instant::now();
            let result = self.inner.hset(namespace, field, value).await;
            log_outcome(&result, started);
            result
        }
        .instrument(tracing::info_span!("store.hset", namespace, field))
        .await
    }

    async fn hincr(&self, namespace: &str, field: &str) -> Result<i64, StoreError> {
        let result = self
            .inner
            .hincr(namespace, field)
            .instrument(tracing::info_span!("store.hincr", namespace, field))
            .await;
        tracing::trace!(namespace, field, value = ?result.as_ref().ok(), "hincr");
        result
    }

    async fn hdecr(&self, namespace: &str, field: &str) -> Result<i64, StoreError> {
        let result = self
            .inner
            .hdecr(namespace, field)
            .instrument(tracing::info_span!("store.hdecr", namespace, field))
            .await;
        tracing::trace!(namespace, field, value = ?result.as_ref().ok(), "hdecr");
        result
    }

    async fn hdel(&self, namespace: &str, field: &str) -> Result<(), StoreError> {
        self.inner
            .hdel(namespace, field)
            .instrument(tracing::info_span!("store.hdel", namespace, field))
            .await
    }

    async fn hgetall(&self, namespace: &str) -> Result<HashMap<String, Value>, StoreError> {
        self.inner
            .hgetall(namespace)
            .instrument(tracing::info_span!("store.hgetall", namespace))
            .await
    }

    async fn rpush(&self, list: &str, value: Value) -> Result<i64, StoreError> {
        let result = self
            .inner
            .rpush(list, value)
            .instrument(tracing::info_span!("store.rpush", list))
            .await;
        tracing::debug!(list, len = ?result.as_ref().ok(), "rpush");
        result
    }

    async fn lpush(&self, list: &str, value: Value) -> Result<i64, StoreError> {
        let result = self
            .inner
            .lpush(list, value)
            .instrument(tracing::info_span!("store.lpush", list))
            .await;
        tracing::debug!(list, len = ?result.as_ref().ok(), "lpush");
        result
    }

    async fn rpop(&self, list: &str) -> Result<Option<Value>, StoreError> {
        self.inner
            .rpop(list)
            .instrument(tracing::info_span!("store.rpop", list))
            .await
    }

    async fn lpop(&self, list: &str) -> Result<Option<Value>, StoreError> {
        self.inner
            .lpop(list)
            .instrument(tracing::info_span!("store.lpop", list))
            .await
    }

    async fn brpop(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, StoreError> {
        let span = tracing::info_span!(
            "store.brpop",
            list,
            timeout_ms = timeout.map(|d| d.as_millis() as u64)
        );
        async {
            tracing::debug!("waiting");
            let started = Instant::now();
            let result = self.inner.brpop(list, timeout).await;
            match &result {
                Ok(Some(_)) => tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "popped"
                ),
                Ok(None) => tracing::debug!("timed out"),
                Err(e) => tracing::error!(error = %e, "brpop failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn blpop(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, StoreError> {
        let span = tracing::info_span!(
            "store.blpop",
            list,
            timeout_ms = timeout.map(|d| d.as_millis() as u64)
        );
        async {
            tracing::debug!("waiting");
            let started = Instant::now();
            let result = self.inner.blpop(list, timeout).await;
            match &result {
                Ok(Some(_)) => tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "popped"
                ),
                Ok(None) => tracing::debug!("timed out"),
                Err(e) => tracing::error!(error = %e, "blpop failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn exec(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StoreError> {
        let span = tracing::info_span!("store.exec", commands = commands.len());
        async {
            let started = Instant::now();
            let result = self.inner.exec(commands).await;
            log_outcome(&result, started);
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
