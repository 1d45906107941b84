// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! cosync-core: shared substrate for the cosync coordination toolkit
//!
//! This crate provides:
//! - The `Store` contract for atomic key, hash, and list operations
//! - An in-memory `Store` with TTL expiry and a tracing wrapper
//! - `State<T>`, a typed namespaced view over a `Store`
//! - Clock and ID abstractions so time and tokens stay testable
//! - `CoordinationConfig`, the defaults shared by every lock primitive

pub mod clock;
pub mod config;
pub mod id;
pub mod state;
pub mod store;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, CoordinationConfig};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use state::State;
pub use store::{
    Command, MemoryStore, Reply, SetOptions, SharedStore, Store, StoreError, TracedStore,
    Transaction,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use store::{FakeStore, StoreCall};
