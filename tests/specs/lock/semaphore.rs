//! Semaphore specs
//!
//! Outstanding tokens never exceed the configured size.

use crate::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn one_past_size_fails_fast() {
    let semaphore = Semaphore::new(3).unwrap();
    let mut tokens = Vec::new();
    for _ in 0..3 {
        tokens.push(semaphore.try_lock().await.unwrap());
    }
    assert!(matches!(
        semaphore.try_lock().await,
        Err(LockError::CouldNotLock { .. })
    ));
    for token in tokens {
        token.release().await.unwrap();
    }
}

#[tokio::test]
async fn outstanding_tokens_stay_within_size() {
    let semaphore = Semaphore::new(3).unwrap();
    let out = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let semaphore = semaphore.clone();
            let out = Arc::clone(&out);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let token = semaphore.lock().await.unwrap();
                let now = out.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                out.fetch_sub(1, Ordering::SeqCst);
                token.release().await.unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(semaphore.available().await.unwrap(), 3);
}

#[tokio::test]
async fn shared_semaphore_bound_spans_instances() {
    let store = store();
    let config = SemaphoreConfig::new("pool", 2).with_spin_interval(SPIN);
    let a = Semaphore::shared(Arc::clone(&store), config.clone()).unwrap();
    let b = Semaphore::shared(Arc::clone(&store), config).unwrap();

    let first = a.try_lock().await.unwrap();
    let second = b.try_lock().await.unwrap();
    assert!(a.try_lock().await.is_err());
    assert!(b.try_lock().await.is_err());

    first.release().await.unwrap();
    second.release().await.unwrap();
    assert_eq!(a.available().await.unwrap(), 2);
}
