//! Release specs
//!
//! Every lock variant's release handle works exactly once.

use crate::prelude::*;

async fn assert_second_release_fails(lock: &dyn Lock) {
    let release = lock.lock().await.unwrap();
    release.release().await.unwrap();
    for _ in 0..2 {
        assert!(
            matches!(release.release().await, Err(LockError::AlreadyReleased { .. })),
            "{} accepted a second release",
            lock.name()
        );
    }
    assert!(!lock.is_locked().await.unwrap(), "{} stayed locked", lock.name());
}

#[tokio::test]
async fn local_mutex() {
    assert_second_release_fails(&Mutex::new("jobs")).await;
}

#[tokio::test]
async fn distributed_mutex() {
    let mutex = Mutex::distributed(store(), MutexConfig::new("jobs")).unwrap();
    assert_second_release_fails(&mutex).await;
}

#[tokio::test]
async fn local_semaphore() {
    assert_second_release_fails(&Semaphore::new(1).unwrap()).await;
}

#[tokio::test]
async fn shared_semaphore() {
    let semaphore = Semaphore::shared(store(), SemaphoreConfig::new("pool", 1)).unwrap();
    assert_second_release_fails(&semaphore).await;
}

#[tokio::test]
async fn rwmutex_write_side() {
    assert_second_release_fails(&RwMutex::new().unwrap()).await;
}

#[tokio::test]
async fn rwmutex_read_side() {
    let rw = RwMutex::new().unwrap();
    assert_second_release_fails(&rw.rlocker()).await;
}
