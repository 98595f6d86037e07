//! Integration tests for routine failures
//!
//! A routine that fails after emitting k values delivers those k values and
//! then surfaces the same failure on every later `move_next`.

use stepwise::{CancellationSignal, EnumeratorState, Sequence, SequenceError};

#[derive(Debug, thiserror::Error)]
#[error("sensor {0} went offline")]
struct SensorOffline(u32);

fn failing_after(k: u32) -> Sequence<u32> {
    Sequence::new(move |emitter| async move {
        for i in 0..k {
            emitter.emit(i).await?;
        }
        Err(SensorOffline(k).into())
    })
}

#[tokio::test]
async fn test_values_before_failure_are_delivered() {
    let none = CancellationSignal::none();
    let mut enumerator = failing_after(3).get_enumerator(&none).await.unwrap();

    let mut seen = Vec::new();
    let err = loop {
        match enumerator.move_next(&none).await {
            Ok(true) => seen.push(*enumerator.current().unwrap()),
            Ok(false) => panic!("routine should fail, not complete"),
            Err(err) => break err,
        }
    };
    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(enumerator.state(), EnumeratorState::Faulted);

    let SequenceError::RoutineFailure(failure) = err else {
        panic!("expected routine failure, got {:?}", err);
    };
    let offline = failure.inner().downcast_ref::<SensorOffline>().unwrap();
    assert_eq!(offline.0, 3);
}

#[tokio::test]
async fn test_failure_is_sticky() {
    let none = CancellationSignal::none();
    let mut enumerator = failing_after(0).get_enumerator(&none).await.unwrap();

    let first = match enumerator.move_next(&none).await {
        Err(SequenceError::RoutineFailure(failure)) => failure,
        other => panic!("expected routine failure, got {:?}", other),
    };
    for _ in 0..3 {
        match enumerator.move_next(&none).await {
            Err(SequenceError::RoutineFailure(again)) => assert!(first.same_failure(&again)),
            other => panic!("expected the same failure, got {:?}", other),
        }
    }
    assert!(enumerator.current().is_none());
}

#[tokio::test]
async fn test_dispose_after_failure_keeps_failure() {
    let none = CancellationSignal::none();
    let mut enumerator = failing_after(1).get_enumerator(&none).await.unwrap();
    assert!(enumerator.move_next(&none).await.unwrap());
    assert!(enumerator.move_next(&none).await.is_err());

    enumerator.dispose().await;
    assert_eq!(enumerator.state(), EnumeratorState::Faulted);
    assert!(matches!(
        enumerator.move_next(&none).await,
        Err(SequenceError::RoutineFailure(_))
    ));
}

#[tokio::test]
async fn test_panic_becomes_routine_failure() {
    let sequence = Sequence::new(|emitter| async move {
        emitter.emit("first").await?;
        let empty: Vec<&str> = Vec::new();
        emitter.emit(empty[0]).await?;
        Ok(())
    });
    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&none).await.unwrap();

    assert!(enumerator.move_next(&none).await.unwrap());
    assert_eq!(enumerator.current(), Some(&"first"));
    let err = enumerator.move_next(&none).await.unwrap_err();
    assert!(matches!(err, SequenceError::RoutineFailure(_)));
    assert!(err.to_string().contains("routine panicked"));
}

#[tokio::test]
async fn test_for_each_returns_failure() {
    let mut seen = 0;
    let err = failing_after(2)
        .for_each(&CancellationSignal::none(), |_| seen += 1)
        .await
        .unwrap_err();
    assert_eq!(seen, 2);
    assert!(err.to_string().contains("sensor 2 went offline"));
}

#[tokio::test]
async fn test_emit_twice_without_request_is_protocol_violation() {
    let sequence = Sequence::new(|emitter| async move {
        let first = emitter.emit(1u8);
        let second = emitter.emit(2u8);
        let (a, b) = tokio::join!(first, second);
        a?;
        b?;
        Ok(())
    });
    let none = CancellationSignal::none();
    let mut enumerator = sequence.get_enumerator(&none).await.unwrap();

    let mut outcome = Ok(true);
    for _ in 0..3 {
        outcome = enumerator.move_next(&none).await;
        if outcome.is_err() {
            break;
        }
    }
    let err = outcome.unwrap_err();
    assert!(
        matches!(err, SequenceError::ProtocolViolation(_)),
        "expected protocol violation, got {:?}",
        err
    );
    assert_eq!(enumerator.state(), EnumeratorState::Faulted);
    assert!(matches!(
        enumerator.move_next(&none).await,
        Err(SequenceError::ProtocolViolation(_))
    ));
}
