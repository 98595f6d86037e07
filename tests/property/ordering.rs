//! Property-based tests for ordering and backpressure

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stepwise::{CancellationSignal, Sequence, SequenceError};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// Every emitted value arrives exactly once, in emission order.
#[test]
fn test_delivery_preserves_order_property() {
    let rt = runtime();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&any::<Vec<i32>>(), |items| {
            let sequence = Sequence::from_vec(items.clone());
            let collected = rt.block_on(sequence.collect(&CancellationSignal::none()));
            prop_assert_eq!(collected.unwrap(), items);
            Ok(())
        })
        .unwrap();
}

/// Disposing after k deliveries leaves the producer having computed exactly
/// min(k, n) values.
#[test]
fn test_producer_never_runs_ahead_property() {
    let rt = runtime();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(0usize..40, 0usize..40), |(n, k)| {
            let produced = Arc::new(AtomicUsize::new(0));
            let sequence = Sequence::new({
                let produced = Arc::clone(&produced);
                move |emitter| {
                    let produced = Arc::clone(&produced);
                    async move {
                        for i in 0..n {
                            produced.fetch_add(1, Ordering::SeqCst);
                            emitter.emit(i).await?;
                        }
                        Ok(())
                    }
                }
            });

            let delivered = rt.block_on(async {
                let none = CancellationSignal::none();
                let mut enumerator = sequence.get_enumerator(&none).await?;
                let mut delivered = 0;
                while delivered < k && enumerator.move_next(&none).await? {
                    delivered += 1;
                }
                enumerator.dispose().await;
                Ok::<_, SequenceError>(delivered)
            });

            prop_assert_eq!(delivered.unwrap(), n.min(k));
            prop_assert_eq!(produced.load(Ordering::SeqCst), n.min(k));
            Ok(())
        })
        .unwrap();
}

/// A routine failing after k values delivers those k values first.
#[test]
fn test_failure_after_prefix_property() {
    let rt = runtime();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(any::<u16>(), 0..20), |prefix| {
            let values = Arc::new(prefix.clone());
            let sequence = Sequence::new(move |emitter| {
                let values = Arc::clone(&values);
                async move {
                    for value in values.iter() {
                        emitter.emit(*value).await?;
                    }
                    anyhow::bail!("prefix exhausted")
                }
            });

            let mut seen = Vec::new();
            let result = rt.block_on(sequence.for_each(&CancellationSignal::none(), |v| seen.push(v)));
            prop_assert!(matches!(result, Err(SequenceError::RoutineFailure(_))));
            prop_assert_eq!(seen, prefix);
            Ok(())
        })
        .unwrap();
}
