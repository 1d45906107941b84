// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

const SHORT: Option<Duration> = Some(Duration::from_millis(20));

#[tokio::test]
async fn empty_group_is_already_done() {
    let group = WaitGroup::new();
    group.wait(SHORT).await.unwrap();
}

#[tokio::test]
async fn counts_resolve_after_matching_done_calls() {
    let group = WaitGroup::new();
    group.add(Waitable::Count(2)).unwrap();
    assert_eq!(group.wait(SHORT).await, Err(WaitGroupError::Timeout));

    let worker = {
        let group = group.clone();
        tokio::spawn(async move {
            group.done().unwrap();
            group.done().unwrap();
        })
    };
    group.wait(Some(Duration::from_millis(500))).await.unwrap();
    worker.await.unwrap();
    assert_eq!(group.count(), 0);
}

#[test]
fn counter_never_goes_negative() {
    let group = WaitGroup::new();
    assert_eq!(group.done(), Err(WaitGroupError::NegativeCounter));
    group.add(Waitable::Count(1)).unwrap();
    assert_eq!(
        group.add(Waitable::Count(-2)),
        Err(WaitGroupError::NegativeCounter)
    );
    assert_eq!(group.count(), 1);
}

#[tokio::test]
async fn deferred_tasks_are_counted_until_they_finish() {
    let group = WaitGroup::new();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    group
        .add(Waitable::Deferred(tokio::spawn(async move {
            let _ = release_rx.await;
        })))
        .unwrap();
    assert_eq!(group.count(), 1);
    assert_eq!(group.wait(SHORT).await, Err(WaitGroupError::Timeout));

    release_tx.send(()).unwrap();
    group.wait(Some(Duration::from_millis(500))).await.unwrap();
}

#[tokio::test]
async fn failed_task_fails_the_wait() {
    let group = WaitGroup::new();
    let task = tokio::spawn(std::future::pending::<()>());
    task.abort();
    group.add(Waitable::Deferred(task)).unwrap();

    let outcome = group.wait(Some(Duration::from_millis(500))).await;
    assert!(matches!(outcome, Err(WaitGroupError::Failed(_))), "{outcome:?}");
    assert_eq!(group.count(), 0);
}

#[tokio::test]
async fn failure_only_fails_its_own_round() {
    let group = WaitGroup::new();
    let task = tokio::spawn(std::future::pending::<()>());
    task.abort();
    group.add(Waitable::Deferred(task)).unwrap();
    let first = group.wait(Some(Duration::from_millis(500))).await;
    assert!(matches!(first, Err(WaitGroupError::Failed(_))), "{first:?}");
    // Every waiter of the failed round sees it
    assert!(group.wait(SHORT).await.is_err());

    group.add(Waitable::Count(1)).unwrap();
    group.done().unwrap();
    group.wait(SHORT).await.unwrap();
}

#[tokio::test]
async fn factories_are_resolved_when_added() {
    let group = WaitGroup::new();
    group
        .add(Waitable::factory(|| Waitable::factory(|| Waitable::Count(3))))
        .unwrap();
    assert_eq!(group.count(), 3);
}

#[test]
fn deferred_outside_a_runtime_is_an_error() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let task = runtime.spawn(async {});
    let group = WaitGroup::new();
    assert!(matches!(
        group.add(Waitable::Deferred(task)),
        Err(WaitGroupError::Failed(_))
    ));
    assert_eq!(group.count(), 0);
}

proptest! {
    #[test]
    fn adds_and_dones_balance(counts in proptest::collection::vec(0i64..5, 0..10)) {
        let group = WaitGroup::new();
        for n in &counts {
            group.add(Waitable::Count(*n)).unwrap();
        }
        let total: i64 = counts.iter().sum();
        prop_assert_eq!(group.count(), total);
        for _ in 0..total {
            group.done().unwrap();
        }
        prop_assert_eq!(group.count(), 0);
        prop_assert_eq!(group.done(), Err(WaitGroupError::NegativeCounter));
    }
}
