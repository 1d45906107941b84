// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! CSP channels for cooperative tasks
//!
//! A [`Channel`] is a closeable queue with an optional buffer. A value put
//! while a taker waits goes straight to that taker; otherwise it is buffered,
//! or the putter waits until a taker steals it. Both ends can be used as a
//! queue or as a stack (`lput` / `rtake`).
//!
//! [`Select`] takes from whichever of several channels is ready first, in
//! declaration order, with an optional non-blocking default.

mod after;
mod channel;
mod error;
mod select;

pub use after::after;
pub use channel::{Channel, ReadOnly, Source, Values, WriteOnly};
pub use error::ChannelError;
pub use select::Select;
