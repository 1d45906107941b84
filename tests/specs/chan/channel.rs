//! Channel specs
//!
//! Values come out in the order they went in, and closing a channel still
//! lets readers drain what was buffered.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn unbuffered_values_arrive_in_put_order() {
    let chan = Channel::unbuffered();
    let producer = {
        let chan = chan.clone();
        tokio::spawn(async move {
            for n in 0..20 {
                chan.put(n).await.unwrap();
            }
            chan.close();
        })
    };

    let mut seen = Vec::new();
    let mut values = chan.values();
    while let Some(n) = values.next().await {
        seen.push(n);
    }
    producer.await.unwrap();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn unbuffered_put_completes_only_after_a_take() {
    let chan = Channel::unbuffered();
    let putter = {
        let chan = chan.clone();
        tokio::spawn(async move { chan.put("job").await })
    };
    settle().await;
    assert!(!putter.is_finished());

    assert_eq!(chan.take().await, Ok("job"));
    assert_eq!(putter.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn buffered_put_then_take_round_trips() {
    let chan = Channel::buffered(1);
    chan.put(42).await.unwrap();
    assert_eq!(chan.take().await, Ok(42));
    assert!(chan.is_empty());
}

#[tokio::test]
async fn closed_channel_drains_then_reports_closed() {
    let chan = Channel::buffered(3);
    for n in 1..=3 {
        chan.put(n).await.unwrap();
    }
    chan.close();

    assert_eq!(chan.put(4).await, Err(ChannelError::Closed));
    let mut drained = Vec::new();
    while let Ok(n) = chan.take().await {
        drained.push(n);
    }
    assert_eq!(drained, vec![1, 2, 3]);
    assert_eq!(chan.take().await, Err(ChannelError::Closed));
}

#[tokio::test]
async fn take_timeout_expires_on_an_idle_channel() {
    let chan: Channel<u8> = Channel::unbuffered();
    assert_eq!(
        chan.take_timeout(Duration::from_millis(10)).await,
        Err(ChannelError::Timeout)
    );
}
