// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store contract for coordination state
//!
//! A `Store` is the only boundary between the lock primitives and a backing
//! key/value engine. Every operation must be atomic with respect to other
//! callers of the same store; the locks built on top rely on nothing else.
//!
//! Values are JSON so that in-memory and remote backends agree on encoding.

mod memory;
mod traced;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use memory::MemoryStore;
pub use traced::TracedStore;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStore, StoreCall};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A store shared by every `State` and lock that coordinates through it
pub type SharedStore = Arc<dyn Store>;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key {key} holds a value of the wrong kind")]
    WrongType { key: String },
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Options for `Store::set`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Only set the key if it is not already present
    pub not_exists: bool,
    /// Expire the key after this long
    pub expires: Option<Duration>,
}

impl SetOptions {
    pub fn not_exists() -> Self {
        Self {
            not_exists: true,
            expires: None,
        }
    }

    pub fn with_expiry(mut self, ttl: Duration) -> Self {
        self.expires = Some(ttl);
        self
    }
}

/// A single store operation, as buffered by a `Transaction`
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: Value, options: SetOptions },
    Del { key: String },
    Incr { key: String },
    Decr { key: String },
    HGet { namespace: String, field: String },
    HSet { namespace: String, field: String, value: Value },
    HIncr { namespace: String, field: String },
    HDecr { namespace: String, field: String },
    HDel { namespace: String, field: String },
    RPush { list: String, value: Value },
    LPush { list: String, value: Value },
    RPop { list: String },
    LPop { list: String },
}

impl Command {
    /// The key, hash namespace, or list the command touches
    pub fn key(&self) -> &str {
        match self {
            Command::Get { key }
            | Command::Set { key, .. }
            | Command::Del { key }
            | Command::Incr { key }
            | Command::Decr { key } => key,
            Command::HGet { namespace, .. }
            | Command::HSet { namespace, .. }
            | Command::HIncr { namespace, .. }
            | Command::HDecr { namespace, .. }
            | Command::HDel { namespace, .. } => namespace,
            Command::RPush { list, .. }
            | Command::LPush { list, .. }
            | Command::RPop { list }
            | Command::LPop { list } => list,
        }
    }
}

/// Result of a single `Command`
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// The command completed with nothing to report
    Done,
    /// Whether a conditional write happened
    Flag(bool),
    /// New counter value or list length
    Int(i64),
    /// A read value, `None` when absent
    Value(Option<Value>),
}

impl Reply {
    /// Extract a read value, rejecting other reply kinds
    pub fn into_value(self) -> Result<Option<Value>, StoreError> {
        match self {
            Reply::Value(value) => Ok(value),
            other => Err(StoreError::InvalidState(format!(
                "expected a value reply, got {other:?}"
            ))),
        }
    }

    pub fn into_int(self) -> Result<i64, StoreError> {
        match self {
            Reply::Int(n) => Ok(n),
            other => Err(StoreError::InvalidState(format!(
                "expected an integer reply, got {other:?}"
            ))),
        }
    }

    pub fn into_flag(self) -> Result<bool, StoreError> {
        match self {
            Reply::Flag(flag) => Ok(flag),
            other => Err(StoreError::InvalidState(format!(
                "expected a flag reply, got {other:?}"
            ))),
        }
    }
}

/// Atomic key, hash, and list operations against a backing engine
///
/// Counters that do not exist yet start at zero.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Read a scalar key
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a scalar key; returns false when `not_exists` prevented the write
    async fn set(&self, key: &str, value: Value, options: SetOptions)
        -> Result<bool, StoreError>;

    /// Remove a key of any kind
    async fn del(&self, key: &str) -> Result<(), StoreError>;

    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn decr(&self, key: &str) -> Result<i64, StoreError>;

    /// Read a field of a namespaced hash
    async fn hget(&self, namespace: &str, field: &str) -> Result<Option<Value>, StoreError>;

    async fn hset(&self, namespace: &str, field: &str, value: Value) -> Result<(), StoreError>;

    async fn hincr(&self, namespace: &str, field: &str) -> Result<i64, StoreError>;

    async fn hdecr(&self, namespace: &str, field: &str) -> Result<i64, StoreError>;

    async fn hdel(&self, namespace: &str, field: &str) -> Result<(), StoreError>;

    /// Read every field of a namespaced hash
    async fn hgetall(&self, namespace: &str) -> Result<HashMap<String, Value>, StoreError>;

    /// Append to a list; returns the new length
    async fn rpush(&self, list: &str, value: Value) -> Result<i64, StoreError>;

    /// Prepend to a list; returns the new length
    async fn lpush(&self, list: &str, value: Value) -> Result<i64, StoreError>;

    async fn rpop(&self, list: &str) -> Result<Option<Value>, StoreError>;

    async fn lpop(&self, list: &str) -> Result<Option<Value>, StoreError>;

    /// Pop from the tail, waiting up to `timeout` (forever when `None`)
    async fn brpop(&self, list: &str, timeout: Option<Duration>)
        -> Result<Option<Value>, StoreError>;

    /// Pop from the head, waiting up to `timeout` (forever when `None`)
    async fn blpop(&self, list: &str, timeout: Option<Duration>)
        -> Result<Option<Value>, StoreError>;

    /// Apply a batch of commands atomically
    async fn exec(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StoreError>;

    /// Start buffering an atomic batch
    fn multi(&self) -> Transaction {
        Transaction::new()
    }
}

/// A buffered batch of commands applied with `Store::exec`
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn get(self, key: impl Into<String>) -> Self {
        self.push(Command::Get { key: key.into() })
    }

    pub fn set(self, key: impl Into<String>, value: Value, options: SetOptions) -> Self {
        self.push(Command::Set {
            key: key.into(),
            value,
            options,
        })
    }

    pub fn del(self, key: impl Into<String>) -> Self {
        self.push(Command::Del { key: key.into() })
    }

    pub fn incr(self, key: impl Into<String>) -> Self {
        self.push(Command::Incr { key: key.into() })
    }

    pub fn decr(self, key: impl Into<String>) -> Self {
        self.push(Command::Decr { key: key.into() })
    }

    pub fn hget(self, namespace: impl Into<String>, field: impl Into<String>) -> Self {
        self.push(Command::HGet {
            namespace: namespace.into(),
            field: field.into(),
        })
    }

    pub fn hset(
        self,
        namespace: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) -> Self {
        self.push(Command::HSet {
            namespace: namespace.into(),
            field: field.into(),
            value,
        })
    }

    pub fn hincr(self, namespace: impl Into<String>, field: impl Into<String>) -> Self {
        self.push(Command::HIncr {
            namespace: namespace.into(),
            field: field.into(),
        })
    }

    pub fn hdecr(self, namespace: impl Into<String>, field: impl Into<String>) -> Self {
        self.push(Command::HDecr {
            namespace: namespace.into(),
            field: field.into(),
        })
    }

    pub fn rpush(self, list: impl Into<String>, value: Value) -> Self {
        self.push(Command::RPush {
            list: list.into(),
            value,
        })
    }

    pub fn lpop(self, list: impl Into<String>) -> Self {
        self.push(Command::LPop { list: list.into() })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Apply the buffered commands atomically, one reply per command
    pub async fn exec<S: Store + ?Sized>(self, store: &S) -> Result<Vec<Reply>, StoreError> {
        if self.commands.is_empty() {
            return Ok(Vec::new());
        }
        store.exec(self.commands).await
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
