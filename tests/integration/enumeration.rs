//! Integration tests for ordered delivery through enumerators
//!
//! Tests cover:
//! - Full drain in emission order
//! - Sticky end-of-sequence
//! - Independent concurrent enumerators
//! - Demand-driven production (no read-ahead)
//! - Stream adapter

use super::test_utils::{counting_sequence, slow_sequence, ProducedCounter};
use futures::StreamExt;
use std::time::Duration;
use stepwise::{CancellationSignal, EnumeratorState, Sequence};

#[tokio::test]
async fn test_full_drain_in_order() {
    let sequence = counting_sequence(5, ProducedCounter::default());
    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&none).await.unwrap();

    let mut seen = Vec::new();
    while enumerator.move_next(&none).await.unwrap() {
        seen.push(*enumerator.current().unwrap());
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);

    for _ in 0..3 {
        assert!(!enumerator.move_next(&none).await.unwrap());
    }
    assert_eq!(enumerator.state(), EnumeratorState::Completed);
}

#[tokio::test]
async fn test_producer_never_runs_ahead() {
    let counter = ProducedCounter::default();
    let sequence = counting_sequence(5, counter.clone());
    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&none).await.unwrap();

    for expected in 1..=3 {
        assert!(enumerator.move_next(&none).await.unwrap());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.get(), expected);
    }
}

#[tokio::test]
async fn test_concurrent_enumerators_do_not_interfere() {
    let sequence = Sequence::new(|emitter| async move {
        for i in 0..=4u32 {
            tokio::task::yield_now().await;
            emitter.emit(i).await?;
        }
        Ok(())
    });

    let none = CancellationSignal::none();
    let mut first = sequence.get_enumerator(&none).await.unwrap();
    let mut second = sequence.get_enumerator(&none).await.unwrap();
    assert_ne!(first.id(), second.id());

    let drain_first = async {
        let mut seen = Vec::new();
        while first.move_next(&none).await.unwrap() {
            seen.push(*first.current().unwrap());
        }
        seen
    };
    let drain_second = async {
        let mut seen = Vec::new();
        while second.move_next(&none).await.unwrap() {
            seen.push(*second.current().unwrap());
        }
        seen
    };
    let (a, b) = tokio::join!(drain_first, drain_second);
    assert_eq!(a, vec![0, 1, 2, 3, 4]);
    assert_eq!(b, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enumerators_on_separate_tasks() {
    let sequence = slow_sequence(5, Duration::from_millis(2));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let sequence = sequence.clone();
        handles.push(tokio::spawn(async move {
            sequence.collect(&CancellationSignal::none()).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}

#[tokio::test]
async fn test_repeated_move_next_without_reading_current() {
    let sequence = counting_sequence(4, ProducedCounter::default());
    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&none).await.unwrap();

    assert!(enumerator.move_next(&none).await.unwrap());
    assert!(enumerator.move_next(&none).await.unwrap());
    assert!(enumerator.move_next(&none).await.unwrap());
    assert_eq!(enumerator.current(), Some(&3));
    assert_eq!(enumerator.delivered(), 3);
}

#[tokio::test]
async fn test_into_stream() {
    let sequence = counting_sequence(3, ProducedCounter::default());
    let enumerator = sequence
        .get_enumerator(&CancellationSignal::none())
        .await
        .unwrap();
    let items: Vec<u32> = enumerator
        .into_stream()
        .map(|item| item.unwrap())
        .collect()
        .await;
    assert_eq!(items, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_routine_doing_async_work_between_items() {
    let sequence = slow_sequence(3, Duration::from_millis(5));
    let items = sequence.collect(&CancellationSignal::none()).await.unwrap();
    assert_eq!(items, vec![0, 1, 2]);
}
