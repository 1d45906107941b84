//! RwMutex specs
//!
//! Readers and writers exclude each other, and a waiting writer holds off
//! new readers.

use crate::prelude::*;

fn rwmutex() -> RwMutex {
    RwMutex::with_store(
        store(),
        RwMutexConfig::default()
            .with_namespace("docs")
            .with_spin_interval(SPIN),
    )
    .unwrap()
}

#[tokio::test]
async fn reader_blocks_fail_fast_writer() {
    let rw = rwmutex();
    let read = rw.rlock(LockOptions::default()).await.unwrap();
    assert!(matches!(
        rw.wlock(LockOptions::fail_fast()).await,
        Err(LockError::CouldNotLock { .. })
    ));
    read.release().await.unwrap();
}

#[tokio::test]
async fn writer_blocks_fail_fast_reader() {
    let rw = rwmutex();
    let write = rw.wlock(LockOptions::default()).await.unwrap();
    assert!(matches!(
        rw.rlock(LockOptions::fail_fast()).await,
        Err(LockError::CouldNotLock { .. })
    ));
    write.release().await.unwrap();
}

#[tokio::test]
async fn waiting_writer_gets_in_before_later_readers() {
    let rw = rwmutex();
    let read = rw.rlock(LockOptions::default()).await.unwrap();
    let writer = {
        let rw = rw.clone();
        tokio::spawn(async move { rw.wlock(LockOptions::default()).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let late_reader = {
        let rw = rw.clone();
        tokio::spawn(async move { rw.rlock(LockOptions::default()).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!late_reader.is_finished());

    read.release().await.unwrap();
    let write = writer.await.unwrap();
    assert!(!late_reader.is_finished());
    write.release().await.unwrap();
    late_reader.await.unwrap().release().await.unwrap();
}

#[tokio::test]
async fn lock_wait_times_out() {
    let rw = rwmutex();
    let _write = rw.wlock(LockOptions::default()).await.unwrap();
    let err = rw
        .rlock(LockOptions::with_timeout(Duration::from_millis(15)))
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Timeout { .. }));
}
