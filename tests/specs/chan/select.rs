//! Select specs
//!
//! When several cases are ready, the first one declared wins.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn first_declared_ready_case_wins_every_time() {
    for _ in 0..50 {
        let a = Channel::buffered(1);
        let b = Channel::buffered(1);
        b.put("b").await.unwrap();
        a.put("a").await.unwrap();

        let picked = Select::new()
            .case(&a, |v| v)
            .case(&b, |v| v)
            .wait()
            .await;
        assert_eq!(picked, Ok("a"));
        assert_eq!(b.len(), 1);
    }
}

#[tokio::test]
async fn default_runs_when_nothing_is_ready() {
    let a: Channel<&str> = Channel::unbuffered();
    let picked = Select::new()
        .case(&a, |v| v)
        .default(|| "idle")
        .try_run();
    assert_eq!(picked, Ok(Some("idle")));
}

#[tokio::test]
async fn timer_bounds_a_wait() {
    let jobs: Channel<u32> = Channel::unbuffered();
    let timer = after(Duration::from_millis(10));

    let picked = Select::new()
        .case(&jobs, Some)
        .case(&timer, |()| None)
        .wait()
        .await;
    assert_eq!(picked, Ok(None));
}

#[tokio::test]
async fn every_case_closed_is_closed() {
    let a: Channel<u32> = Channel::unbuffered();
    a.close();
    let picked = Select::new().case(&a, |v| v).wait().await;
    assert_eq!(picked, Err(ChannelError::Closed));
}
