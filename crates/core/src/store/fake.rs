// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Command, MemoryStore, Reply, SetOptions, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded store call
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Get { key: String },
    Set { key: String, options: SetOptions },
    Del { key: String },
    Incr { key: String },
    Decr { key: String },
    HGet { namespace: String, field: String },
    HSet { namespace: String, field: String },
    HIncr { namespace: String, field: String },
    HDecr { namespace: String, field: String },
    HDel { namespace: String, field: String },
    HGetAll { namespace: String },
    Push { list: String },
    Pop { list: String },
    Exec { commands: usize },
}

/// Fake store for testing
///
/// Backed by a real `MemoryStore`, records every call, and can be told to
/// fail deletes or every operation.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: MemoryStore,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    fail_deletes: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make `del` fail until reset
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every operation fail until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("fake store is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.record(StoreCall::Get {
            key: key.to_string(),
        })?;
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<bool, StoreError> {
        self.record(StoreCall::Set {
            key: key.to_string(),
            options,
        })?;
        self.inner.set(key, value, options).await
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.record(StoreCall::Del {
            key: key.to_string(),
        })?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("delete rejected".to_string()));
        }
        self.inner.del(key).await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.record(StoreCall::Incr {
            key: key.to_string(),
        })?;
        self.inner.incr(key).await
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        self.record(StoreCall::Decr {
            key: key.to_string(),
        })?;
        self.inner.decr(key).await
    }

    async fn hget(&self, namespace: &str, field: &str) -> Result<Option<Value>, StoreError> {
        self.record(StoreCall::HGet {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?;
        self.inner.hget(namespace, field).await
    }

    async fn hset(&self, namespace: &str, field: &str, value: Value) -> Result<(), StoreError> {
        self.record(StoreCall::HSet {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?;
        self.inner.hset(namespace, field, value).await
    }

    async fn hincr(&self, namespace: &str, field: &str) -> Result<i64, StoreError> {
        self.record(StoreCall::HIncr {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?;
        self.inner.hincr(namespace, field).await
    }

    async fn hdecr(&self, namespace: &str, field: &str) -> Result<i64, StoreError> {
        self.record(StoreCall::HDecr {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?;
        self.inner.hdecr(namespace, field).await
    }

    async fn hdel(&self, namespace: &str, field: &str) -> Result<(), StoreError> {
        self.record(StoreCall::HDel {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?;
        self.inner.hdel(namespace, field).await
    }

    async fn hgetall(&self, namespace: &str) -> Result<HashMap<String, Value>, StoreError> {
        self.record(StoreCall::HGetAll {
            namespace: namespace.to_string(),
        })?;
        self.inner.hgetall(namespace).await
    }

    async fn rpush(&self, list: &str, value: Value) -> Result<i64, StoreError> {
        self.record(StoreCall::Push {
            list: list.to_string(),
        })?;
        self.inner.rpush(list, value).await
    }

    async fn lpush(&self, list: &str, value: Value) -> Result<i64, StoreError> {
        self.record(StoreCall::Push {
            list: list.to_string(),
        })?;
        self.inner.lpush(list, value).await
    }

    async fn rpop(&self, list: &str) -> Result<Option<Value>, StoreError> {
        self.record(StoreCall::Pop {
            list: list.to_string(),
        })?;
        self.inner.rpop(list).await
    }

    async fn lpop(&self, list: &str) -> Result<Option<Value>, StoreError> {
        self.record(StoreCall::Pop {
            list: list.to_string(),
        })?;
        self.inner.lpop(list).await
    }

    async fn brpop(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, StoreError> {
        self.record(StoreCall::Pop {
            list: list.to_string(),
        })?;
        self.inner.brpop(list, timeout).await
    }

    async fn blpop(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, StoreError> {
        self.record(StoreCall::Pop {
            list: list.to_string(),
        })?;
        self.inner.blpop(list, timeout).await
    }

    async fn exec(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StoreError> {
        self.record(StoreCall::Exec {
            commands: commands.len(),
        })?;
        self.inner.exec(commands).await
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
