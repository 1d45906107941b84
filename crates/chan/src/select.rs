// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multiplexed take over several channels

use crate::channel::Source;
use crate::error::ChannelError;

enum Polled<R> {
    Ready(R),
    Empty,
    Closed,
}

trait Case<R> {
    fn poll(&mut self) -> Polled<R>;
}

struct SourceCase<'a, T, F> {
    source: &'a (dyn Source<T> + Sync),
    handler: Option<F>,
}

impl<T, R, F: FnOnce(T) -> R> Case<R> for SourceCase<'_, T, F> {
    fn poll(&mut self) -> Polled<R> {
        // A used case must not take values it can no longer hand to anyone
        let Some(handler) = self.handler.take() else {
            return Polled::Closed;
        };
        match self.source.try_take() {
            Ok(Some(value)) => Polled::Ready(handler(value)),
            Ok(None) => {
                self.handler = Some(handler);
                Polled::Empty
            }
            Err(_) => {
                self.handler = Some(handler);
                Polled::Closed
            }
        }
    }
}

/// Take from the first ready channel, in the order cases were added
///
/// ```ignore
/// let outcome = Select::new()
///     .case(&jobs, |job| Work::Job(job))
///     .case(&timer, |()| Work::Tick)
///     .wait()
///     .await?;
/// ```
pub struct Select<'a, R> {
    cases: Vec<Box<dyn Case<R> + Send + 'a>>,
    default: Option<Box<dyn FnOnce() -> R + Send + 'a>>,
}

impl<R> Default for Select<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, R> Select<'a, R> {
    pub fn new() -> Self {
        Self {
            cases: Vec::new(),
            default: None,
        }
    }

    /// Run `handler` with the value if `source` is the first one ready
    pub fn case<T, S, F>(mut self, source: &'a S, handler: F) -> Self
    where
        T: 'a,
        S: Source<T> + Sync + 'a,
        F: FnOnce(T) -> R + Send + 'a,
    {
        self.cases.push(Box::new(SourceCase {
            source: source as &(dyn Source<T> + Sync),
            handler: Some(handler),
        }));
        self
    }

    /// Run `handler` instead of waiting when no case is ready
    pub fn default(mut self, handler: impl FnOnce() -> R + Send + 'a) -> Self {
        self.default = Some(Box::new(handler));
        self
    }

    /// Poll every case once without waiting
    ///
    /// `Ok(None)` means nothing was ready and there is no default. A case or
    /// default that produced an outcome is used up; running the same `Select`
    /// again only polls what is left, and `NoCases` once no case remains.
    pub fn try_run(&mut self) -> Result<Option<R>, ChannelError> {
        if self.cases.is_empty() {
            return Err(ChannelError::NoCases);
        }

        let mut all_closed = true;
        for i in 0..self.cases.len() {
            match self.cases[i].poll() {
                Polled::Ready(outcome) => {
                    self.cases.remove(i);
                    return Ok(Some(outcome));
                }
                Polled::Empty => all_closed = false,
                Polled::Closed => {}
            }
        }

        if let Some(default) = self.default.take() {
            return Ok(Some(default()));
        }
        if all_closed {
            return Err(ChannelError::Closed);
        }
        Ok(None)
    }

    /// Poll until a case is ready, yielding to other tasks between rounds
    pub async fn wait(mut self) -> Result<R, ChannelError> {
        loop {
            if let Some(outcome) = self.try_run()? {
                return Ok(outcome);
            }
            tracing::trace!(cases = self.cases.len(), "select found nothing ready, yielding");
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
#[path = "select_tests.rs"]
mod tests;
