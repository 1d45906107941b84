// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Resilience helpers built on cosync locks and state
//!
//! - **Bulkhead** - bounds concurrent calls with a `Semaphore`
//! - **CircuitBreaker** - rejects calls after repeated failures, tracked in a `State`
//! - **with_timeout** - bounds a fallible future
//! - **WaitGroup** - waits for counts and tasks to finish
//! - **Scope** - task with deferred cleanups that run on every exit path

pub mod breaker;
pub mod bulkhead;
mod error;
pub mod scope;
pub mod timeout;
pub mod waitgroup;

pub use breaker::{BreakerConfig, BreakerRecord, BreakerState, CircuitBreaker};
pub use bulkhead::Bulkhead;
pub use error::{ResilienceError, ScopeError, WaitGroupError};
pub use scope::{Scope, ScopedTask};
pub use timeout::with_timeout;
pub use waitgroup::{WaitGroup, Waitable};
