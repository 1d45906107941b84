// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::channel::Channel;
use std::time::Duration;

/// A channel that receives one `()` after `delay`, then closes
///
/// Meant as a `Select` case for bounding how long a select waits. Must be
/// called inside a tokio runtime.
pub fn after(delay: Duration) -> Channel<()> {
    let chan = Channel::buffered(1);
    let timer = chan.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        // Nothing else puts on this channel, so the buffer has room
        let _ = timer.put(()).await;
        timer.close();
    });
    chan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelError;

    #[tokio::test]
    async fn fires_once_then_closes() {
        let timer = after(Duration::from_millis(10));
        assert_eq!(timer.try_take(), Ok(None));

        timer.take().await.unwrap();
        assert!(timer.is_closed());
        assert_eq!(timer.take().await, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn does_not_fire_early() {
        let timer = after(Duration::from_millis(100));
        assert_eq!(
            timer.take_timeout(Duration::from_millis(20)).await,
            Err(ChannelError::Timeout)
        );
        assert_eq!(timer.take_timeout(Duration::from_secs(2)).await, Ok(()));
    }
}
