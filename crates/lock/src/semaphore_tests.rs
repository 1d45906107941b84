// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cosync_core::{MemoryStore, SetOptions};
use proptest::prelude::*;

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn shared_config(size: usize) -> SemaphoreConfig {
    SemaphoreConfig::new("pool", size).with_spin_interval(Duration::from_millis(1))
}

#[test]
fn zero_size_is_invalid() {
    assert!(matches!(
        Semaphore::new(0),
        Err(LockError::InvalidConfiguration(_))
    ));
    let store: SharedStore = Arc::new(MemoryStore::new());
    assert!(matches!(
        Semaphore::shared(store, SemaphoreConfig::new("pool", 0)),
        Err(LockError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn grants_up_to_size_then_fails_fast() {
    let semaphore = Semaphore::new(2).unwrap();
    assert_eq!(semaphore.available().await.unwrap(), 2);

    let first = semaphore.try_lock().await.unwrap();
    let second = semaphore.try_lock().await.unwrap();
    assert_eq!(semaphore.available().await.unwrap(), 0);
    assert!(semaphore.is_locked().await.unwrap());
    assert!(matches!(
        semaphore.try_lock().await,
        Err(LockError::CouldNotLock { .. })
    ));

    first.release().await.unwrap();
    assert_eq!(semaphore.available().await.unwrap(), 1);
    assert!(!semaphore.is_locked().await.unwrap());
    second.release().await.unwrap();
    assert_eq!(semaphore.available().await.unwrap(), 2);
}

#[tokio::test]
async fn released_token_goes_to_earliest_waiter() {
    let semaphore = Semaphore::named("workers", 1).unwrap();
    let order = Arc::new(StdMutex::new(Vec::new()));
    let held = semaphore.lock().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..3 {
        let semaphore = semaphore.clone();
        let order = Arc::clone(&order);
        tasks.push(tokio::spawn(async move {
            let token = semaphore.lock().await.unwrap();
            order.lock().unwrap().push(i);
            token.release().await.unwrap();
        }));
        settle().await;
    }

    held.release().await.unwrap();
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert_eq!(semaphore.available().await.unwrap(), 1);
}

#[tokio::test]
async fn hand_off_keeps_the_token_out() {
    let semaphore = Semaphore::new(1).unwrap();
    let held = semaphore.lock().await.unwrap();

    let waiter = {
        let semaphore = semaphore.clone();
        tokio::spawn(async move { semaphore.lock().await.unwrap() })
    };
    settle().await;

    held.release().await.unwrap();
    let token = waiter.await.unwrap();
    assert_eq!(semaphore.available().await.unwrap(), 0);
    assert!(matches!(
        semaphore.try_lock().await,
        Err(LockError::CouldNotLock { .. })
    ));
    token.release().await.unwrap();
}

#[tokio::test]
async fn newcomers_queue_behind_waiters() {
    let semaphore = Semaphore::new(1).unwrap();
    let held = semaphore.lock().await.unwrap();
    let waiter = {
        let semaphore = semaphore.clone();
        tokio::spawn(async move { semaphore.lock().await.unwrap() })
    };
    settle().await;

    held.release().await.unwrap();
    // The freed token went to the waiter, not to this fail-fast caller
    assert!(semaphore.try_lock().await.is_err());
    waiter.await.unwrap().release().await.unwrap();
}

#[tokio::test]
async fn timeout_withdraws_waiter() {
    let semaphore = Semaphore::new(1).unwrap();
    let held = semaphore.lock().await.unwrap();

    let err = semaphore
        .acquire(LockOptions::with_timeout(Duration::from_millis(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Timeout { .. }));

    held.release().await.unwrap();
    assert_eq!(semaphore.available().await.unwrap(), 1);
}

#[tokio::test]
async fn cancelled_waiter_does_not_leak_a_token() {
    let semaphore = Semaphore::new(1).unwrap();
    let held = semaphore.lock().await.unwrap();
    let abandoned = {
        let semaphore = semaphore.clone();
        tokio::spawn(async move { semaphore.lock().await.map(|_| ()) })
    };
    settle().await;
    abandoned.abort();
    let _ = abandoned.await;

    held.release().await.unwrap();
    assert_eq!(semaphore.available().await.unwrap(), 1);
}

#[tokio::test]
async fn double_release_is_an_error() {
    let semaphore = Semaphore::new(3).unwrap();
    let token = semaphore.lock().await.unwrap();
    token.release().await.unwrap();
    assert!(matches!(
        token.release().await,
        Err(LockError::AlreadyReleased { .. })
    ));
    assert_eq!(semaphore.available().await.unwrap(), 3);
}

#[tokio::test]
async fn shared_semaphores_share_the_counter() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let a = Semaphore::shared(Arc::clone(&store), shared_config(1)).unwrap();
    let b = Semaphore::shared(Arc::clone(&store), shared_config(1)).unwrap();

    let held = a.lock().await.unwrap();
    assert_eq!(
        store.hget("cosync:semaphore:pool", "tokens_out").await.unwrap(),
        Some(serde_json::json!(1))
    );
    assert!(b.is_locked().await.unwrap());
    assert!(b.try_lock().await.is_err());

    let waiter = tokio::spawn(async move { b.lock().await.unwrap() });
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(!waiter.is_finished());

    // Released through `a`, so `b`'s waiter only sees it by re-checking
    held.release().await.unwrap();
    let token = tokio::time::timeout(Duration::from_millis(500), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.available().await.unwrap(), 0);
    token.release().await.unwrap();
    assert_eq!(a.available().await.unwrap(), 1);
}

#[tokio::test]
async fn busy_guard_does_not_outlast_the_callers_patience() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let semaphore = Semaphore::shared(Arc::clone(&store), shared_config(2)).unwrap();
    // Another process is mid-update and holds the guard
    store
        .set(
            "cosync:mutex:pool:guard",
            serde_json::json!("elsewhere"),
            SetOptions::default(),
        )
        .await
        .unwrap();

    assert!(matches!(
        semaphore.try_lock().await,
        Err(LockError::CouldNotLock { .. })
    ));
    let waited = tokio::time::timeout(
        Duration::from_millis(500),
        semaphore.acquire(LockOptions::with_timeout(Duration::from_millis(20))),
    )
    .await
    .unwrap();
    assert!(matches!(waited, Err(LockError::Timeout { .. })));

    store.del("cosync:mutex:pool:guard").await.unwrap();
    semaphore.try_lock().await.unwrap().release().await.unwrap();
}

#[test]
fn config_derives_from_coordination() {
    let coordination = CoordinationConfig::default().with_namespace_prefix("billing");
    let config = SemaphoreConfig::from_coordination("exports", 4, &coordination);
    assert_eq!(config.namespace(), "billing:semaphore:exports");
    assert_eq!(config.guard_config().key(), "billing:mutex:exports:guard");
    assert_eq!(config.size, 4);
}

proptest! {
    #[test]
    fn fail_fast_grants_never_exceed_size(size in 1usize..6, attempts in 0usize..12) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (granted, available) = runtime.block_on(async {
            let semaphore = Semaphore::new(size).unwrap();
            let mut held = Vec::new();
            for _ in 0..attempts {
                match semaphore.try_lock().await {
                    Ok(token) => held.push(token),
                    Err(e) => assert!(e.is_contention()),
                }
            }
            (held.len(), semaphore.available().await.unwrap())
        });

        prop_assert_eq!(granted, attempts.min(size));
        prop_assert_eq!(available, size - granted);
    }
}
