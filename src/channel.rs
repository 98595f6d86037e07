//! Value Channel
//!
//! Single-slot rendezvous between one producer routine and one consumer. The
//! producer hands over a value and stays suspended until the consumer has
//! taken it *and* asked for the next one, so a routine never computes an
//! item nobody requested. The consumer asks for a value and stays suspended
//! until one arrives or the routine ends.
//!
//! Suspensions wait on [`tokio::sync::Notify`], so a parked side never holds
//! a worker thread.

use crate::cancel::CancellationSignal;
use crate::error::SequenceError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

/// Hand-off slot. Exactly one of these at any instant.
enum Slot<T> {
    Idle,
    /// Consumer asked for a value, producer has not supplied it yet.
    RequestPending,
    /// Producer supplied a value, consumer has not taken it yet.
    ValueReady(T),
}

#[derive(Clone)]
enum Closure {
    End,
    /// Routine failure or a protocol violation raised by the routine.
    Failed(SequenceError),
    Cancelled,
}

struct State<T> {
    slot: Slot<T>,
    closure: Option<Closure>,
    consumer_waiting: bool,
    delivered: u64,
}

/// Observable phase of a channel, reported in enumerator diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChannelPhase {
    Idle,
    RequestPending,
    ValueReady,
    /// The routine ended, failed, or the channel was cancelled, and no value
    /// is left to pick up.
    Closed,
}

/// Single-slot rendezvous between a producer and a consumer.
pub struct ValueChannel<T> {
    state: Mutex<State<T>>,
    to_consumer: Notify,
    to_producer: Notify,
}

impl<T> ValueChannel<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slot: Slot::Idle,
                closure: None,
                consumer_waiting: false,
                delivered: 0,
            }),
            to_consumer: Notify::new(),
            to_producer: Notify::new(),
        }
    }

    /// Hand `value` to the consumer and wait until the consumer has taken it
    /// and requested another.
    ///
    /// Fails with [`SequenceError::ProtocolViolation`] if a previously
    /// submitted value is still unclaimed, and with
    /// [`SequenceError::Cancelled`] once the channel has been cancelled.
    pub async fn submit(&self, value: T) -> Result<(), SequenceError> {
        {
            let mut state = self.state.lock();
            match state.closure {
                Some(Closure::Cancelled) => return Err(SequenceError::Cancelled),
                Some(_) => {
                    return Err(SequenceError::ProtocolViolation(
                        "value submitted after the routine finished".to_string(),
                    ))
                }
                None => {}
            }
            if let Slot::ValueReady(_) = state.slot {
                return Err(SequenceError::ProtocolViolation(
                    "value submitted before the previous value was claimed".to_string(),
                ));
            }
            state.slot = Slot::ValueReady(value);
        }
        trace!("Value submitted to channel");
        self.to_consumer.notify_one();

        loop {
            let notified = self.to_producer.notified();
            {
                let state = self.state.lock();
                if let Some(Closure::Cancelled) = state.closure {
                    return Err(SequenceError::Cancelled);
                }
                // The slot only returns to RequestPending after our value was
                // taken and the consumer asked again.
                if let Slot::RequestPending = state.slot {
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Ask for the next value and wait for it.
    ///
    /// Resolves to `Ok(Some(value))`, `Ok(None)` once the routine has ended,
    /// or the routine's failure. A value that was already waiting in the slot
    /// is returned without resuming the producer.
    pub async fn request_next(&self) -> Result<Option<T>, SequenceError> {
        {
            let mut state = self.state.lock();
            if state.consumer_waiting {
                return Err(SequenceError::ProtocolViolation(
                    "concurrent move_next not allowed".to_string(),
                ));
            }
            if let Some(settled) = Self::settle(&mut state) {
                return settled;
            }
            // A request left behind by an abandoned call stays pending.
            if let Slot::Idle = state.slot {
                state.slot = Slot::RequestPending;
            }
            state.consumer_waiting = true;
        }
        let _waiting = ConsumerWaiting { channel: self };
        self.to_producer.notify_one();

        loop {
            let notified = self.to_consumer.notified();
            {
                let mut state = self.state.lock();
                if let Some(settled) = Self::settle(&mut state) {
                    return settled;
                }
            }
            notified.await;
        }
    }

    /// Record the routine's end. An unclaimed value is still delivered
    /// before the end is observed. No effect once closed.
    pub fn close(&self, outcome: Result<(), SequenceError>) {
        {
            let mut state = self.state.lock();
            if state.closure.is_some() {
                return;
            }
            state.closure = Some(match outcome {
                Ok(()) => Closure::End,
                Err(err) => Closure::Failed(err),
            });
        }
        self.to_consumer.notify_one();
    }

    /// Release both sides with a cancellation outcome. Every later operation
    /// fails with [`SequenceError::Cancelled`]; an unclaimed value is dropped.
    pub fn cancel(&self) {
        let dropped = {
            let mut state = self.state.lock();
            if let Some(Closure::Cancelled) = state.closure {
                return;
            }
            state.closure = Some(Closure::Cancelled);
            std::mem::replace(&mut state.slot, Slot::Idle)
        };
        drop(dropped);
        trace!("Channel cancelled");
        self.to_consumer.notify_one();
        self.to_producer.notify_one();
    }

    pub(crate) fn phase(&self) -> ChannelPhase {
        let state = self.state.lock();
        match (&state.slot, &state.closure) {
            (_, Some(Closure::Cancelled)) => ChannelPhase::Closed,
            (Slot::ValueReady(_), _) => ChannelPhase::ValueReady,
            (_, Some(_)) => ChannelPhase::Closed,
            (Slot::RequestPending, None) => ChannelPhase::RequestPending,
            (Slot::Idle, None) => ChannelPhase::Idle,
        }
    }

    /// Number of values the consumer has taken so far.
    pub(crate) fn delivered(&self) -> u64 {
        self.state.lock().delivered
    }

    fn settle(state: &mut State<T>) -> Option<Result<Option<T>, SequenceError>> {
        if let Some(Closure::Cancelled) = state.closure {
            return Some(Err(SequenceError::Cancelled));
        }
        match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::ValueReady(value) => {
                state.delivered += 1;
                return Some(Ok(Some(value)));
            }
            other => state.slot = other,
        }
        match &state.closure {
            Some(Closure::End) => Some(Ok(None)),
            Some(Closure::Failed(err)) => Some(Err(err.clone())),
            _ => None,
        }
    }
}

impl<T> Default for ValueChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the consumer-waiting mark when a request completes or is dropped.
struct ConsumerWaiting<'a, T> {
    channel: &'a ValueChannel<T>,
}

impl<T> Drop for ConsumerWaiting<'_, T> {
    fn drop(&mut self) {
        self.channel.state.lock().consumer_waiting = false;
    }
}

/// Producer-side handle passed to a production routine.
pub struct Emitter<T> {
    channel: Arc<ValueChannel<T>>,
    signal: CancellationSignal,
}

impl<T> Emitter<T> {
    pub fn new(channel: Arc<ValueChannel<T>>, signal: CancellationSignal) -> Self {
        Self { channel, signal }
    }

    /// Emit a value and wait until the consumer asks for the next one.
    ///
    /// Returns [`SequenceError::Cancelled`] when the run has been cancelled;
    /// routines normally propagate it with `?`.
    #[must_use = "emit does nothing unless awaited"]
    pub async fn emit(&self, value: T) -> Result<(), SequenceError> {
        self.channel.submit(value).await
    }

    /// The run's cancellation signal, for routines that want to stop their
    /// own long waits early.
    pub fn cancellation(&self) -> &CancellationSignal {
        &self.signal
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }
}
