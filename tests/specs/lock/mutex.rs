//! Mutex specs
//!
//! Critical sections guarded by one mutex never overlap, locally or through
//! a shared store.

use crate::prelude::*;
use tokio::time::Instant;

async fn record_sections(lock: Arc<dyn Lock>, workers: usize) -> Vec<(Instant, Instant)> {
    let sections = Arc::new(std::sync::Mutex::new(Vec::new()));
    let tasks: Vec<_> = (0..workers)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let sections = Arc::clone(&sections);
            tokio::spawn(async move {
                let release = lock.lock().await.unwrap();
                let start = Instant::now();
                tokio::time::sleep(Duration::from_millis(2)).await;
                let end = Instant::now();
                sections.lock().unwrap().push((start, end));
                release.release().await.unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }
    let mut sections = sections.lock().unwrap().clone();
    sections.sort();
    sections
}

fn assert_disjoint(sections: &[(Instant, Instant)]) {
    for pair in sections.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "sections overlap: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test]
async fn local_mutex_sections_do_not_overlap() {
    let sections = record_sections(Arc::new(Mutex::new("jobs")), 10).await;
    assert_eq!(sections.len(), 10);
    assert_disjoint(&sections);
}

#[tokio::test]
async fn distributed_mutex_sections_do_not_overlap() {
    let store = store();
    let config = MutexConfig::new("jobs").with_spin_interval(SPIN);
    let a = Mutex::distributed(Arc::clone(&store), config.clone()).unwrap();
    let b = Mutex::distributed(Arc::clone(&store), config).unwrap();

    let (left, right) = tokio::join!(
        record_sections(Arc::new(a), 4),
        record_sections(Arc::new(b), 4)
    );
    let mut sections: Vec<_> = left.into_iter().chain(right).collect();
    sections.sort();
    assert_disjoint(&sections);
}

#[tokio::test]
async fn fail_fast_on_a_held_mutex_is_could_not_lock() {
    let mutex = Mutex::new("jobs");
    let _held = mutex.lock().await.unwrap();
    assert!(matches!(
        mutex.try_lock().await,
        Err(LockError::CouldNotLock { .. })
    ));
}
