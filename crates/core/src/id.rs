// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity tokens for lock attempts and anonymous namespaces

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hands out tokens that tell one lock holder apart from another
///
/// Locks keep an `Arc<dyn IdGen>`, so tests can swap in a predictable source.
pub trait IdGen: Send + Sync + 'static {
    fn token(&self) -> String;
}

/// Random v4 UUID tokens
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn token(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// `"{prefix}-{n}"` tokens counting up from 1; clones share the counter
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: Arc<str>,
    issued: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().into(),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// How many tokens have been handed out so far
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("token")
    }
}

impl IdGen for SequentialIdGen {
    fn token(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{n}", self.prefix)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
