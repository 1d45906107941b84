//! Resilience specs
//!
//! Consumers built on the primitives keep their guarantees end to end.

use crate::prelude::*;
use cosync_resilience::{
    with_timeout, BreakerConfig, BreakerState, Bulkhead, CircuitBreaker, ResilienceError, Scope,
    WaitGroup, Waitable,
};
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn bulkhead_limits_concurrent_work() {
    let bulkhead = Arc::new(Bulkhead::new("io", 2).unwrap());
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let bulkhead = Arc::clone(&bulkhead);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                bulkhead
                    .run(|| async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, String>(())
                    })
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(bulkhead.available().await.unwrap(), 2);
}

#[tokio::test]
async fn breaker_rejects_after_repeated_failures() {
    let breaker = CircuitBreaker::new(
        store(),
        BreakerConfig::new("payments")
            .with_max_errors(2)
            .with_timeout(Duration::from_secs(60)),
    )
    .unwrap();

    for _ in 0..2 {
        let err = breaker.call(|| async { Err::<(), _>("down") }).await;
        assert!(matches!(err, Err(ResilienceError::Inner("down"))));
    }
    assert_eq!(breaker.state().await.unwrap(), BreakerState::Closed);
    assert!(matches!(
        breaker.call(|| async { Ok::<_, String>(()) }).await,
        Err(ResilienceError::Rejected { .. })
    ));

    breaker.reset().await.unwrap();
    assert_eq!(breaker.state().await.unwrap(), BreakerState::Open);
}

#[tokio::test]
async fn timed_out_lock_wait_frees_its_place() {
    let mutex = Mutex::new("jobs");
    let held = mutex.lock().await.unwrap();

    let waited = with_timeout(Duration::from_millis(10), mutex.lock()).await;
    assert!(matches!(waited, Err(ResilienceError::Timeout(_))));

    held.release().await.unwrap();
    mutex.try_lock().await.unwrap().release().await.unwrap();
}

#[tokio::test]
async fn waitgroup_waits_for_spawned_work() {
    let group = WaitGroup::new();
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let done = Arc::clone(&done);
        group
            .add(Waitable::Deferred(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();
    }
    group.wait(Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(done.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn scope_cleanups_run_when_work_is_cancelled() {
    let cleaned = Arc::new(AtomicUsize::new(0));
    let task = {
        let cleaned = Arc::clone(&cleaned);
        Scope::spawn(move |scope| async move {
            scope.defer(move || {
                cleaned.fetch_add(1, Ordering::SeqCst);
            });
            std::future::pending::<()>().await
        })
    };
    settle().await;
    task.cancel();
    assert!(task.join().await.is_err());
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}
