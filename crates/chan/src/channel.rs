// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendezvous channel with an optional buffer
//!
//! Invariants, all held under the state lock:
//! - `buffer.len() <= buffer_size`
//! - putters wait only while the buffer is full
//! - takers wait only while the buffer is empty and no putter waits

use crate::error::ChannelError;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Which end of the queue an operation works on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum End {
    Front,
    Back,
}

struct Putter<T> {
    id: u64,
    value: T,
    end: End,
    tx: oneshot::Sender<()>,
}

struct Taker<T> {
    id: u64,
    tx: oneshot::Sender<T>,
}

struct Inner<T> {
    buffer: VecDeque<T>,
    buffer_size: usize,
    putters: VecDeque<Putter<T>>,
    takers: VecDeque<Taker<T>>,
    open: bool,
    next_waiter: u64,
}

impl<T> Inner<T> {
    fn next_waiter(&mut self) -> u64 {
        self.next_waiter += 1;
        self.next_waiter
    }

    /// A value available without waiting, from the buffer or a putter
    fn pop_ready(&mut self, end: End) -> Option<T> {
        let buffered = match end {
            End::Front => self.buffer.pop_front(),
            End::Back => self.buffer.pop_back(),
        };
        if let Some(value) = buffered {
            // Room was made; the earliest putter moves into the buffer
            if let Some(putter) = self.putters.pop_front() {
                match putter.end {
                    End::Back => self.buffer.push_back(putter.value),
                    End::Front => self.buffer.push_front(putter.value),
                }
                let _ = putter.tx.send(());
            }
            return Some(value);
        }

        let putter = match end {
            End::Front => self.putters.pop_front(),
            End::Back => self.putters.pop_back(),
        }?;
        tracing::debug!(putter = putter.id, "value stolen from waiting putter");
        let _ = putter.tx.send(());
        Some(putter.value)
    }

    /// Give `value` to a waiting taker, returning it if none is left
    fn hand_to_taker(&mut self, value: T, end: End) -> Result<u64, T> {
        let mut value = value;
        loop {
            let taker = match end {
                End::Back => self.takers.pop_front(),
                End::Front => self.takers.pop_back(),
            };
            let Some(taker) = taker else {
                return Err(value);
            };
            match taker.tx.send(value) {
                Ok(()) => return Ok(taker.id),
                Err(returned) => value = returned,
            }
        }
    }
}

/// A CSP channel
///
/// Clones share the same channel. With a buffer size of zero every transfer
/// is a rendezvous between a putter and a taker.
pub struct Channel<T> {
    id: u64,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("buffered", &state.buffer.len())
            .field("buffer_size", &state.buffer_size)
            .field("putters", &state.putters.len())
            .field("takers", &state.takers.len())
            .field("open", &state.open)
            .finish()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::unbuffered()
    }
}

impl<T> Channel<T> {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(Mutex::new(Inner {
                buffer: VecDeque::new(),
                buffer_size,
                putters: VecDeque::new(),
                takers: VecDeque::new(),
                open: true,
                next_waiter: 0,
            })),
        }
    }

    pub fn unbuffered() -> Self {
        Self::new(0)
    }

    pub fn buffered(size: usize) -> Self {
        Self::new(size)
    }

    /// Identity shared by every clone of this channel
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn buffer_size(&self) -> usize {
        self.lock().buffer_size
    }

    /// Number of buffered values
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        !self.lock().open
    }

    /// Close the channel
    ///
    /// Waiting takers fail with `Closed`. Buffered values and values of
    /// putters already waiting can still be taken.
    pub fn close(&self) {
        let takers = {
            let mut state = self.lock();
            if !state.open {
                return;
            }
            state.open = false;
            std::mem::take(&mut state.takers)
        };
        tracing::debug!(channel = self.id, woken = takers.len(), "channel closed");
        drop(takers);
    }

    /// Put at the back, waiting for room or a taker
    pub async fn put(&self, value: T) -> Result<(), ChannelError> {
        self.send(value, End::Back, None).await
    }

    pub async fn put_timeout(&self, value: T, timeout: Duration) -> Result<(), ChannelError> {
        self.send(value, End::Back, Some(timeout)).await
    }

    /// Put at the front, so the value is taken before older ones
    pub async fn lput(&self, value: T) -> Result<(), ChannelError> {
        self.send(value, End::Front, None).await
    }

    pub async fn lput_timeout(&self, value: T, timeout: Duration) -> Result<(), ChannelError> {
        self.send(value, End::Front, Some(timeout)).await
    }

    /// Take from the front, waiting for a value
    pub async fn take(&self) -> Result<T, ChannelError> {
        self.receive(End::Front, None).await
    }

    pub async fn take_timeout(&self, timeout: Duration) -> Result<T, ChannelError> {
        self.receive(End::Front, Some(timeout)).await
    }

    /// Take the most recently buffered value
    pub async fn rtake(&self) -> Result<T, ChannelError> {
        self.receive(End::Back, None).await
    }

    pub async fn rtake_timeout(&self, timeout: Duration) -> Result<T, ChannelError> {
        self.receive(End::Back, Some(timeout)).await
    }

    /// Take a value only if one is ready now
    ///
    /// `Ok(None)` means the channel is open but has nothing to give;
    /// `Err(Closed)` means it is closed and drained.
    pub fn try_take(&self) -> Result<Option<T>, ChannelError> {
        self.probe(End::Front)
    }

    pub fn try_rtake(&self) -> Result<Option<T>, ChannelError> {
        self.probe(End::Back)
    }

    pub fn read_only(&self) -> ReadOnly<T> {
        ReadOnly {
            chan: self.clone(),
        }
    }

    pub fn write_only(&self) -> WriteOnly<T> {
        WriteOnly {
            chan: self.clone(),
        }
    }

    /// Values taken one by one until the channel is closed and drained
    pub fn values(&self) -> Values<T> {
        Values {
            chan: self.clone(),
            done: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn probe(&self, end: End) -> Result<Option<T>, ChannelError> {
        let mut state = self.lock();
        match state.pop_ready(end) {
            Some(value) => Ok(Some(value)),
            None if state.open => {
                tracing::trace!(channel = self.id, "probe found nothing");
                Ok(None)
            }
            None => Err(ChannelError::Closed),
        }
    }

    async fn send(&self, value: T, end: End, timeout: Option<Duration>) -> Result<(), ChannelError> {
        let (id, rx) = {
            let mut state = self.lock();
            if !state.open {
                return Err(ChannelError::Closed);
            }
            let value = match state.hand_to_taker(value, end) {
                Ok(taker) => {
                    tracing::debug!(channel = self.id, taker, "value handed to waiting taker");
                    return Ok(());
                }
                Err(value) => value,
            };
            if state.buffer.len() < state.buffer_size {
                match end {
                    End::Back => state.buffer.push_back(value),
                    End::Front => state.buffer.push_front(value),
                }
                return Ok(());
            }
            let id = state.next_waiter();
            let (tx, rx) = oneshot::channel();
            let putter = Putter { id, value, end, tx };
            match end {
                End::Back => state.putters.push_back(putter),
                End::Front => state.putters.push_front(putter),
            }
            tracing::debug!(channel = self.id, putter = id, waiting = state.putters.len(), "putter waiting");
            (id, rx)
        };

        let mut wait = PutWait {
            chan: self,
            id,
            rx,
            armed: true,
        };
        let taken = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, &mut wait.rx).await.ok(),
            None => Some((&mut wait.rx).await),
        };
        match taken {
            Some(Ok(())) => {
                wait.armed = false;
                Ok(())
            }
            // Putters are only dropped after being signalled
            Some(Err(_)) => {
                wait.armed = false;
                Err(ChannelError::Closed)
            }
            None if wait.withdraw() => Ok(()),
            None => {
                tracing::debug!(channel = self.id, putter = id, "put timed out");
                Err(ChannelError::Timeout)
            }
        }
    }

    async fn receive(&self, end: End, timeout: Option<Duration>) -> Result<T, ChannelError> {
        let (id, rx) = {
            let mut state = self.lock();
            if let Some(value) = state.pop_ready(end) {
                return Ok(value);
            }
            if !state.open {
                return Err(ChannelError::Closed);
            }
            let id = state.next_waiter();
            let (tx, rx) = oneshot::channel();
            state.takers.push_back(Taker { id, tx });
            tracing::debug!(channel = self.id, taker = id, waiting = state.takers.len(), "taker waiting");
            (id, rx)
        };

        let mut wait = TakeWait {
            chan: self,
            id,
            rx,
            armed: true,
        };
        let handed = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, &mut wait.rx).await.ok(),
            None => Some((&mut wait.rx).await),
        };
        match handed {
            Some(result) => {
                wait.armed = false;
                // A dropped sender means close woke this taker
                result.map_err(|_| ChannelError::Closed)
            }
            None => match wait.withdraw() {
                Some(result) => result,
                None => {
                    tracing::debug!(channel = self.id, taker = id, "take timed out");
                    Err(ChannelError::Timeout)
                }
            },
        }
    }

    /// Return a value handed to a taker that went away
    fn restore(&self, value: T) {
        let mut state = self.lock();
        let value = match state.hand_to_taker(value, End::Back) {
            Ok(_) => return,
            Err(value) => value,
        };
        if state.buffer.len() < state.buffer_size {
            state.buffer.push_front(value);
        } else {
            let id = state.next_waiter();
            let (tx, _) = oneshot::channel();
            state.putters.push_front(Putter {
                id,
                value,
                end: End::Front,
                tx,
            });
        }
    }
}

/// A waiting putter; removes its value from the channel if dropped early
struct PutWait<'a, T> {
    chan: &'a Channel<T>,
    id: u64,
    rx: oneshot::Receiver<()>,
    armed: bool,
}

impl<T> PutWait<'_, T> {
    /// Leave the queue; returns true if a taker already has the value
    fn withdraw(&mut self) -> bool {
        self.armed = false;
        {
            let mut state = self.chan.lock();
            if let Some(pos) = state.putters.iter().position(|p| p.id == self.id) {
                state.putters.remove(pos);
                return false;
            }
        }
        self.rx.try_recv().is_ok()
    }
}

impl<T> Drop for PutWait<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.withdraw();
        }
    }
}

/// A waiting taker; leaves the queue if dropped early
struct TakeWait<'a, T> {
    chan: &'a Channel<T>,
    id: u64,
    rx: oneshot::Receiver<T>,
    armed: bool,
}

impl<T> TakeWait<'_, T> {
    /// Leave the queue; returns the outcome if one already arrived
    fn withdraw(&mut self) -> Option<Result<T, ChannelError>> {
        self.armed = false;
        {
            let mut state = self.chan.lock();
            if let Some(pos) = state.takers.iter().position(|t| t.id == self.id) {
                state.takers.remove(pos);
                return None;
            }
        }
        Some(self.rx.try_recv().map_err(|_| ChannelError::Closed))
    }
}

impl<T> Drop for TakeWait<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(Ok(value)) = self.withdraw() {
            tracing::debug!(channel = self.chan.id, taker = self.id, "taker dropped, value restored");
            self.chan.restore(value);
        }
    }
}

/// Something `select` can take from without waiting
pub trait Source<T> {
    fn id(&self) -> u64;

    fn try_take(&self) -> Result<Option<T>, ChannelError>;
}

impl<T> Source<T> for Channel<T> {
    fn id(&self) -> u64 {
        self.id
    }

    fn try_take(&self) -> Result<Option<T>, ChannelError> {
        Channel::try_take(self)
    }
}

/// Take side of a channel
pub struct ReadOnly<T> {
    chan: Channel<T>,
}

impl<T> Clone for ReadOnly<T> {
    fn clone(&self) -> Self {
        Self {
            chan: self.chan.clone(),
        }
    }
}

impl<T> ReadOnly<T> {
    pub fn id(&self) -> u64 {
        self.chan.id
    }

    pub async fn take(&self) -> Result<T, ChannelError> {
        self.chan.take().await
    }

    pub async fn take_timeout(&self, timeout: Duration) -> Result<T, ChannelError> {
        self.chan.take_timeout(timeout).await
    }

    pub async fn rtake(&self) -> Result<T, ChannelError> {
        self.chan.rtake().await
    }

    pub async fn rtake_timeout(&self, timeout: Duration) -> Result<T, ChannelError> {
        self.chan.rtake_timeout(timeout).await
    }

    pub fn try_take(&self) -> Result<Option<T>, ChannelError> {
        self.chan.try_take()
    }

    pub fn try_rtake(&self) -> Result<Option<T>, ChannelError> {
        self.chan.try_rtake()
    }

    pub fn len(&self) -> usize {
        self.chan.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chan.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.chan.is_closed()
    }

    pub fn values(&self) -> Values<T> {
        self.chan.values()
    }
}

impl<T> Source<T> for ReadOnly<T> {
    fn id(&self) -> u64 {
        self.chan.id
    }

    fn try_take(&self) -> Result<Option<T>, ChannelError> {
        self.chan.try_take()
    }
}

/// Put side of a channel
pub struct WriteOnly<T> {
    chan: Channel<T>,
}

impl<T> Clone for WriteOnly<T> {
    fn clone(&self) -> Self {
        Self {
            chan: self.chan.clone(),
        }
    }
}

impl<T> WriteOnly<T> {
    pub fn id(&self) -> u64 {
        self.chan.id
    }

    pub async fn put(&self, value: T) -> Result<(), ChannelError> {
        self.chan.put(value).await
    }

    pub async fn put_timeout(&self, value: T, timeout: Duration) -> Result<(), ChannelError> {
        self.chan.put_timeout(value, timeout).await
    }

    pub async fn lput(&self, value: T) -> Result<(), ChannelError> {
        self.chan.lput(value).await
    }

    pub async fn lput_timeout(&self, value: T, timeout: Duration) -> Result<(), ChannelError> {
        self.chan.lput_timeout(value, timeout).await
    }

    pub fn close(&self) {
        self.chan.close()
    }

    pub fn is_closed(&self) -> bool {
        self.chan.is_closed()
    }
}

/// Iteration over a channel's values
///
/// Ends once the channel is closed and drained and cannot be restarted.
pub struct Values<T> {
    chan: Channel<T>,
    done: bool,
}

impl<T> Values<T> {
    pub async fn next(&mut self) -> Option<T> {
        if self.done {
            return None;
        }
        match self.chan.take().await {
            Ok(value) => Some(value),
            Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
