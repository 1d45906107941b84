// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Lock primitives for cooperative tasks
//!
//! This crate provides:
//! - **Mutex** - Binary lock with FIFO hand-off, or a store-backed lock with TTL expiry
//! - **Semaphore** - Counting lock that hands tokens directly to queued waiters
//! - **RwMutex** - Reader/writer lock that blocks new readers once a writer waits
//!
//! Every acquisition yields a single-use [`Release`].

mod activity;
mod error;
mod lock;
mod release;
mod spin;

pub mod mutex;
pub mod rwmutex;
pub mod semaphore;

pub use activity::{Activity, ActivityGuard};
pub use error::LockError;
pub use lock::{Lock, LockOptions};
pub use mutex::{Mutex, MutexConfig};
pub use release::Release;
pub use rwmutex::{ReadLocker, RwMutex, RwMutexConfig, RwState};
pub use semaphore::{Semaphore, SemaphoreConfig};
