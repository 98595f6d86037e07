//! Integration tests for early termination and cancellation
//!
//! Tests cover:
//! - Dispose after k values stops production at k
//! - Dispose while the routine is deep inside its own async work
//! - Cancellation through the move_next signal
//! - Cancellation through the creation signal
//! - Dropping an enumerator without dispose

use super::test_utils::{counting_sequence, ProducedCounter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stepwise::{CancellationSignal, EnumeratorState, Sequence, SequenceError};

#[tokio::test]
async fn test_dispose_after_second_value_stops_production() {
    let counter = ProducedCounter::default();
    let sequence = counting_sequence(5, counter.clone());
    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&none).await.unwrap();

    assert!(enumerator.move_next(&none).await.unwrap());
    assert!(enumerator.move_next(&none).await.unwrap());
    assert_eq!(enumerator.current(), Some(&2));

    enumerator.dispose().await;
    assert_eq!(enumerator.state(), EnumeratorState::Cancelled);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counter.get(), 2, "values 3..5 must never be produced");
    assert!(enumerator.move_next(&none).await.unwrap_err().is_cancelled());
    assert!(enumerator.move_next(&none).await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_dispose_while_routine_is_busy() {
    let unwound = Arc::new(AtomicBool::new(false));
    let sequence = Sequence::new({
        let unwound = Arc::clone(&unwound);
        move |emitter| {
            let unwound = Arc::clone(&unwound);
            async move {
                struct Unwind(Arc<AtomicBool>);
                impl Drop for Unwind {
                    fn drop(&mut self) {
                        self.0.store(true, Ordering::SeqCst);
                    }
                }
                let _unwind = Unwind(unwound);
                emitter.emit(1u32).await?;
                // Long async work the routine never finishes on its own.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                emitter.emit(2).await?;
                Ok(())
            }
        }
    });

    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&none).await.unwrap();
    assert!(enumerator.move_next(&none).await.unwrap());

    // The consumer asks for value 2 but gives up quickly.
    let signal = CancellationSignal::new();
    let waiter = {
        let signal = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            signal.cancel();
        })
    };
    let result = tokio::time::timeout(Duration::from_secs(2), enumerator.move_next(&signal))
        .await
        .expect("move_next must not hang");
    assert!(matches!(result, Err(SequenceError::Cancelled)));
    waiter.await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), enumerator.dispose())
        .await
        .expect("dispose must not hang");
    assert!(unwound.load(Ordering::SeqCst), "routine must unwind on cancellation");
    assert_eq!(enumerator.state(), EnumeratorState::Cancelled);
}

#[tokio::test]
async fn test_creation_signal_cancels_run() {
    let sequence = counting_sequence(10, ProducedCounter::default());
    let creation = CancellationSignal::new();
    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&creation).await.unwrap();

    assert!(enumerator.move_next(&none).await.unwrap());
    creation.cancel();
    assert!(enumerator.move_next(&none).await.unwrap_err().is_cancelled());
    assert_eq!(enumerator.state(), EnumeratorState::Cancelled);
}

#[tokio::test]
async fn test_creation_signal_fired_before_start() {
    let counter = ProducedCounter::default();
    let sequence = counting_sequence(3, counter.clone());
    let creation = CancellationSignal::new();
    let mut enumerator = sequence.get_enumerator(&creation).await.unwrap();
    creation.cancel();

    let none = CancellationSignal::none();
    assert!(enumerator.move_next(&none).await.unwrap_err().is_cancelled());
    assert_eq!(counter.get(), 0);
}

#[tokio::test]
async fn test_cancelled_consumer_sees_no_further_values() {
    let sequence = counting_sequence(5, ProducedCounter::default());
    let signal = CancellationSignal::new();
    let mut enumerator = sequence.get_enumerator(&CancellationSignal::none()).await.unwrap();

    assert!(enumerator.move_next(&signal).await.unwrap());
    signal.cancel();
    assert!(enumerator.move_next(&signal).await.unwrap_err().is_cancelled());
    assert!(enumerator.current().is_none());

    let fresh = CancellationSignal::none();
    assert!(enumerator.move_next(&fresh).await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_drop_without_dispose_stops_producer() {
    let counter = ProducedCounter::default();
    let sequence = counting_sequence(100, counter.clone());
    let none = CancellationSignal::none();
    {
        let mut enumerator = sequence.get_enumerator(&none).await.unwrap();
        assert!(enumerator.move_next(&none).await.unwrap());
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(counter.get(), 1);
}
