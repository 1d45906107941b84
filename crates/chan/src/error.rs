// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors from channel operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel is closed, and for takes, drained
    #[error("channel is closed")]
    Closed,
    #[error("timed out waiting on channel")]
    Timeout,
    /// `select` was given nothing to wait on
    #[error("select has no cases")]
    NoCases,
}
