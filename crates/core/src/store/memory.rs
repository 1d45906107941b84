// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store
//!
//! Every operation runs under one map lock, which is what makes single
//! commands and `exec` batches atomic. Expired keys are dropped lazily when
//! touched.

use super::{Command, Reply, SetOptions, Store, StoreError};
use crate::clock::{Clock, SystemClock};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

#[derive(Clone, Debug)]
enum Slot {
    Scalar(Value),
    Hash(HashMap<String, Value>),
    List(VecDeque<Value>),
}

#[derive(Clone, Debug)]
struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(slot: Slot) -> Self {
        Self {
            slot,
            expires_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
}

impl Keyspace {
    /// Drop the key if its TTL has passed
    fn purge_expired(&mut self, key: &str, now: Instant) {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.entries.remove(key);
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut HashMap<String, Value>, StoreError> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Slot::Hash(HashMap::new())));
        match &mut entry.slot {
            Slot::Hash(hash) => Ok(hash),
            _ => Err(wrong_type(key)),
        }
    }

    fn list_mut(&mut self, key: &str) -> Result<&mut VecDeque<Value>, StoreError> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Slot::List(VecDeque::new())));
        match &mut entry.slot {
            Slot::List(list) => Ok(list),
            _ => Err(wrong_type(key)),
        }
    }

    fn apply(&mut self, command: Command, now: Instant) -> Result<Reply, StoreError> {
        match command {
            Command::Get { key } => {
                self.purge_expired(&key, now);
                match self.entries.get(&key).map(|e| &e.slot) {
                    None => Ok(Reply::Value(None)),
                    Some(Slot::Scalar(value)) => Ok(Reply::Value(Some(value.clone()))),
                    Some(_) => Err(wrong_type(&key)),
                }
            }

            Command::Set {
                key,
                value,
                options,
            } => {
                self.purge_expired(&key, now);
                if options.not_exists && self.entries.contains_key(&key) {
                    return Ok(Reply::Flag(false));
                }
                self.entries.insert(
                    key,
                    Entry {
                        slot: Slot::Scalar(value),
                        expires_at: options.expires.map(|ttl| now + ttl),
                    },
                );
                Ok(Reply::Flag(true))
            }

            Command::Del { key } => {
                self.entries.remove(&key);
                Ok(Reply::Done)
            }

            Command::Incr { key } => self.add_scalar(&key, 1, now),
            Command::Decr { key } => self.add_scalar(&key, -1, now),

            Command::HGet { namespace, field } => {
                self.purge_expired(&namespace, now);
                match self.entries.get(&namespace).map(|e| &e.slot) {
                    None => Ok(Reply::Value(None)),
                    Some(Slot::Hash(hash)) => Ok(Reply::Value(hash.get(&field).cloned())),
                    Some(_) => Err(wrong_type(&namespace)),
                }
            }

            Command::HSet {
                namespace,
                field,
                value,
            } => {
                self.purge_expired(&namespace, now);
                self.hash_mut(&namespace)?.insert(field, value);
                Ok(Reply::Done)
            }

            Command::HIncr { namespace, field } => self.add_field(&namespace, &field, 1, now),
            Command::HDecr { namespace, field } => self.add_field(&namespace, &field, -1, now),

            Command::HDel { namespace, field } => {
                self.purge_expired(&namespace, now);
                let now_empty = match self.entries.get_mut(&namespace).map(|e| &mut e.slot) {
                    None => false,
                    Some(Slot::Hash(hash)) => {
                        hash.remove(&field);
                        hash.is_empty()
                    }
                    Some(_) => return Err(wrong_type(&namespace)),
                };
                if now_empty {
                    self.entries.remove(&namespace);
                }
                Ok(Reply::Done)
            }

            Command::RPush { list, value } => {
                self.purge_expired(&list, now);
                let items = self.list_mut(&list)?;
                items.push_back(value);
                Ok(Reply::Int(items.len() as i64))
            }

            Command::LPush { list, value } => {
                self.purge_expired(&list, now);
                let items = self.list_mut(&list)?;
                items.push_front(value);
                Ok(Reply::Int(items.len() as i64))
            }

            Command::RPop { list } => self.pop(&list, false, now),
            Command::LPop { list } => self.pop(&list, true, now),
        }
    }

    fn add_scalar(&mut self, key: &str, delta: i64, now: Instant) -> Result<Reply, StoreError> {
        self.purge_expired(key, now);
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Slot::Scalar(Value::from(0))));
        match &mut entry.slot {
            Slot::Scalar(value) => {
                let next = value.as_i64().ok_or_else(|| wrong_type(key))? + delta;
                *value = Value::from(next);
                Ok(Reply::Int(next))
            }
            _ => Err(wrong_type(key)),
        }
    }

    fn add_field(
        &mut self,
        namespace: &str,
        field: &str,
        delta: i64,
        now: Instant,
    ) -> Result<Reply, StoreError> {
        self.purge_expired(namespace, now);
        let hash = self.hash_mut(namespace)?;
        let current = match hash.get(field) {
            None => 0,
            Some(value) => value.as_i64().ok_or_else(|| wrong_type(namespace))?,
        };
        let next = current + delta;
        hash.insert(field.to_string(), Value::from(next));
        Ok(Reply::Int(next))
    }

    fn pop(&mut self, list: &str, front: bool, now: Instant) -> Result<Reply, StoreError> {
        self.purge_expired(list, now);
        let (value, now_empty) = match self.entries.get_mut(list).map(|e| &mut e.slot) {
            None => return Ok(Reply::Value(None)),
            Some(Slot::List(items)) => {
                let value = if front {
                    items.pop_front()
                } else {
                    items.pop_back()
                };
                (value, items.is_empty())
            }
            Some(_) => return Err(wrong_type(list)),
        };
        if now_empty {
            self.entries.remove(list);
        }
        Ok(Reply::Value(value))
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

/// In-memory `Store`
///
/// Clones share the same keyspace. Separate `MemoryStore::new()` calls do
/// not: processes that must coordinate have to be handed the same instance.
#[derive(Clone)]
pub struct MemoryStore<C: Clock = SystemClock> {
    keyspace: Arc<Mutex<Keyspace>>,
    pushed: Arc<Notify>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            keyspace: Arc::new(Mutex::new(Keyspace::default())),
            pushed: Arc::new(Notify::new()),
            clock,
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.keyspace
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .values()
            .filter(|e| !matches!(e.expires_at, Some(at) if at <= now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn run(&self, command: Command) -> Result<Reply, StoreError> {
        let wakes_poppers = matches!(command, Command::RPush { .. } | Command::LPush { .. });
        let reply = {
            let mut keyspace = self.keyspace.lock().unwrap_or_else(|e| e.into_inner());
            keyspace.apply(command, self.clock.now())?
        };
        if wakes_poppers {
            self.pushed.notify_waiters();
        }
        Ok(reply)
    }

    async fn blocking_pop(
        &self,
        list: &str,
        front: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, StoreError> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            // Register interest before checking so a push in between is not missed
            let pushed = self.pushed.notified();
            tokio::pin!(pushed);
            pushed.as_mut().enable();

            let command = if front {
                Command::LPop {
                    list: list.to_string(),
                }
            } else {
                Command::RPop {
                    list: list.to_string(),
                }
            };
            if let Some(value) = self.run(command)?.into_value()? {
                return Ok(Some(value));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, pushed).await.is_err() {
                        return Ok(None);
                    }
                }
                None => pushed.await,
            }
        }
    }
}

#[async_trait]
impl<C: Clock> Store for MemoryStore<C> {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.run(Command::Get {
            key: key.to_string(),
        })?
        .into_value()
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<bool, StoreError> {
        self.run(Command::Set {
            key: key.to_string(),
            value,
            options,
        })?
        .into_flag()
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.run(Command::Del {
            key: key.to_string(),
        })?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.run(Command::Incr {
            key: key.to_string(),
        })?
        .into_int()
    }

    async fn decr(&self, key: &str) -> Result<i64, StoreError> {
        self.run(Command::Decr {
            key: key.to_string(),
        })?
        .into_int()
    }

    async fn hget(&self, namespace: &str, field: &str) -> Result<Option<Value>, StoreError> {
        self.run(Command::HGet {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?
        .into_value()
    }

    async fn hset(&self, namespace: &str, field: &str, value: Value) -> Result<(), StoreError> {
        self.run(Command::HSet {
            namespace: namespace.to_string(),
            field: field.to_string(),
            value,
        })?;
        Ok(())
    }

    async fn hincr(&self, namespace: &str, field: &str) -> Result<i64, StoreError> {
        self.run(Command::HIncr {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?
        .into_int()
    }

    async fn hdecr(&self, namespace: &str, field: &str) -> Result<i64, StoreError> {
        self.run(Command::HDecr {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?
        .into_int()
    }

    async fn hdel(&self, namespace: &str, field: &str) -> Result<(), StoreError> {
        self.run(Command::HDel {
            namespace: namespace.to_string(),
            field: field.to_string(),
        })?;
        Ok(())
    }

    async fn hgetall(&self, namespace: &str) -> Result<HashMap<String, Value>, StoreError> {
        let mut keyspace = self.keyspace.lock().unwrap_or_else(|e| e.into_inner());
        keyspace.purge_expired(namespace, self.clock.now());
        match keyspace.entries.get(namespace).map(|e| &e.slot) {
            None => Ok(HashMap::new()),
            Some(Slot::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type(namespace)),
        }
    }

    async fn rpush(&self, list: &str, value: Value) -> Result<i64, StoreError> {
        self.run(Command::RPush {
            list: list.to_string(),
            value,
        })?
        .into_int()
    }

    async fn lpush(&self, list: &str, value: Value) -> Result<i64, StoreError> {
        self.run(Command::LPush {
            list: list.to_string(),
            value,
        })?
        .into_int()
    }

    async fn rpop(&self, list: &str) -> Result<Option<Value>, StoreError> {
        self.run(Command::RPop {
            list: list.to_string(),
        })?
        .into_value()
    }

    async fn lpop(&self, list: &str) -> Result<Option<Value>, StoreError> {
        self.run(Command::LPop {
            list: list.to_string(),
        })?
        .into_value()
    }

    async fn brpop(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, StoreError> {
        self.blocking_pop(list, false, timeout).await
    }

    async fn blpop(
        &self,
        list: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<Value>, StoreError> {
        self.blocking_pop(list, true, timeout).await
    }

    async fn exec(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StoreError> {
        let pushes = commands
            .iter()
            .any(|c| matches!(c, Command::RPush { .. } | Command::LPush { .. }));
        let replies = {
            let mut keyspace = self.keyspace.lock().unwrap_or_else(|e| e.into_inner());
            let now = self.clock.now();
            // A failed batch puts every touched key back as it was
            let snapshot: HashMap<String, Option<Entry>> = commands
                .iter()
                .map(|c| (c.key().to_string(), keyspace.entries.get(c.key()).cloned()))
                .collect();
            let applied = commands
                .into_iter()
                .map(|command| keyspace.apply(command, now))
                .collect::<Result<Vec<_>, _>>();
            match applied {
                Ok(replies) => replies,
                Err(e) => {
                    for (key, entry) in snapshot {
                        match entry {
                            Some(entry) => keyspace.entries.insert(key, entry),
                            None => keyspace.entries.remove(&key),
                        };
                    }
                    tracing::debug!(error = %e, "batch failed, rolled back");
                    return Err(e);
                }
            }
        };
        if pushes {
            self.pushed.notify_waiters();
        }
        Ok(replies)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
