// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cosync_core::MemoryStore;
use cosync_lock::LockError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn limits_concurrent_calls() {
    let bulkhead = Bulkhead::new("exports", 2).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let calls: Vec<_> = (0..8)
        .map(|n| {
            let bulkhead = bulkhead.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                bulkhead
                    .run(|| async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, String>(n)
                    })
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for call in calls {
        results.push(call.await.unwrap().unwrap());
    }
    results.sort_unstable();
    assert_eq!(results, (0..8).collect::<Vec<_>>());
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(bulkhead.available().await.unwrap(), 2);
}

#[tokio::test]
async fn fail_fast_rejects_when_full() {
    let bulkhead = Bulkhead::new("exports", 1).unwrap().with_fail_fast();
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let (finish_tx, finish_rx) = tokio::sync::oneshot::channel::<()>();

    let busy = {
        let bulkhead = bulkhead.clone();
        tokio::spawn(async move {
            bulkhead
                .run(|| async move {
                    let _ = started_tx.send(());
                    let _ = finish_rx.await;
                    Ok::<_, String>(())
                })
                .await
        })
    };
    started_rx.await.unwrap();

    let rejected = bulkhead.run(|| async { Ok::<_, String>(()) }).await;
    assert!(matches!(
        rejected,
        Err(ResilienceError::Lock(LockError::CouldNotLock { .. }))
    ));

    finish_tx.send(()).unwrap();
    busy.await.unwrap().unwrap();
}

#[tokio::test]
async fn worker_errors_come_back_as_inner() {
    let bulkhead = Bulkhead::new("exports", 1).unwrap();
    let err = bulkhead
        .run(|| async { Err::<(), _>("boom".to_string()) })
        .await
        .unwrap_err();
    assert_eq!(err.into_inner().as_deref(), Some("boom"));
    // The slot was returned despite the failure
    assert_eq!(bulkhead.available().await.unwrap(), 1);
}

#[tokio::test]
async fn shared_bulkheads_share_the_limit() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let config = SemaphoreConfig::new("exports", 1).with_spin_interval(Duration::from_millis(1));
    let a = Bulkhead::shared(Arc::clone(&store), config.clone()).unwrap();
    let b = Bulkhead::shared(store, config).unwrap().with_fail_fast();

    let outcome = a
        .run(|| async { b.run(|| async { Ok::<_, String>(()) }).await.map_err(|e| e.to_string()) })
        .await;
    let inner = outcome.unwrap_err().into_inner().unwrap();
    assert!(inner.contains("unable to obtain lock"), "{inner}");
}

#[test]
fn zero_size_is_rejected() {
    assert!(matches!(
        Bulkhead::new("exports", 0),
        Err(ResilienceError::Lock(LockError::InvalidConfiguration(_)))
    ));
}
