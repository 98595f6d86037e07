//! Enumerator
//!
//! Owns one run of a production routine. The first `move_next` spawns the
//! routine as a tokio task bound to a fresh [`ValueChannel`]; every later
//! `move_next` grants the routine one more step and waits for the value it
//! emits, its completion, or its failure.
//!
//! Lifecycle:
//!
//! ```text
//! Created -> Running <-> Suspended
//!               |
//!               +-> Completed | Faulted | Cancelled   (terminal, sticky)
//! ```

use crate::cancel::CancellationSignal;
use crate::channel::{Emitter, ValueChannel};
use crate::config::EnumeratorConfig;
use crate::error::{RoutineError, SequenceError};
use crate::producer::Producer;
use futures::{FutureExt, Stream};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Lifecycle state of an [`Enumerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorState {
    /// No routine started yet.
    Created,
    /// Routine is computing the next value.
    Running,
    /// Routine is parked in `emit`, waiting for the consumer.
    Suspended,
    Completed,
    Faulted,
    Cancelled,
}

impl EnumeratorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EnumeratorState::Completed | EnumeratorState::Faulted | EnumeratorState::Cancelled
        )
    }
}

/// Identifier used to correlate log lines of one enumerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumeratorId(u64);

impl EnumeratorId {
    fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        EnumeratorId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Per-enumerator tuning.
#[derive(Debug, Clone)]
pub struct EnumeratorOptions {
    /// How long `dispose` waits for the producer task to unwind before
    /// aborting it.
    pub dispose_timeout: Duration,
}

impl Default for EnumeratorOptions {
    fn default() -> Self {
        EnumeratorOptions::from(&EnumeratorConfig::default())
    }
}

impl From<&EnumeratorConfig> for EnumeratorOptions {
    fn from(config: &EnumeratorConfig) -> Self {
        Self {
            dispose_timeout: Duration::from_millis(config.dispose_timeout_ms),
        }
    }
}

/// Channel, signal and task of a single routine run.
struct Run<T> {
    channel: Arc<ValueChannel<T>>,
    signal: CancellationSignal,
    task: Option<JoinHandle<()>>,
}

impl<T> Run<T> {
    fn new(parent: &CancellationSignal) -> Self {
        Self {
            channel: Arc::new(ValueChannel::new()),
            signal: parent.child(),
            task: None,
        }
    }

    fn cancel(&self) {
        self.signal.cancel();
        self.channel.cancel();
    }
}

/// Consumer-side cursor over one run of a production routine.
pub struct Enumerator<T: Send + 'static> {
    id: EnumeratorId,
    producer: Arc<dyn Producer<T>>,
    single_use: bool,
    options: EnumeratorOptions,
    creation_signal: CancellationSignal,
    run: Run<T>,
    state: EnumeratorState,
    current: Option<T>,
    failure: Option<SequenceError>,
    delivered: u64,
}

impl<T: Send + 'static> Enumerator<T> {
    pub(crate) fn new(
        producer: Arc<dyn Producer<T>>,
        single_use: bool,
        options: EnumeratorOptions,
        creation_signal: &CancellationSignal,
    ) -> Self {
        let id = EnumeratorId::next();
        debug!(enumerator_id = id.as_u64(), single_use, "Enumerator created");
        Self {
            id,
            producer,
            single_use,
            options,
            creation_signal: creation_signal.clone(),
            run: Run::new(creation_signal),
            state: EnumeratorState::Created,
            current: None,
            failure: None,
            delivered: 0,
        }
    }

    pub fn id(&self) -> EnumeratorId {
        self.id
    }

    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    /// Number of values delivered by the current run.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Value delivered by the most recent `move_next` that returned `true`.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Move the current value out, leaving `current()` empty until the next
    /// successful `move_next`.
    pub fn take_current(&mut self) -> Option<T> {
        self.current.take()
    }

    /// Advance to the next value.
    ///
    /// Returns `Ok(true)` when a value is available through [`current`],
    /// `Ok(false)` once the routine has finished (and on every later call),
    /// the routine's failure (again on every later call), or
    /// [`SequenceError::Cancelled`] if `signal` fires while waiting or the
    /// run was cancelled earlier.
    ///
    /// [`current`]: Enumerator::current
    pub async fn move_next(&mut self, signal: &CancellationSignal) -> Result<bool, SequenceError> {
        match self.state {
            EnumeratorState::Completed => return Ok(false),
            EnumeratorState::Faulted => return Err(self.stored_failure()),
            EnumeratorState::Cancelled => return Err(SequenceError::Cancelled),
            EnumeratorState::Created => {
                if signal.is_cancelled() || self.run.signal.is_cancelled() {
                    self.cancel_run().await;
                    return Err(SequenceError::Cancelled);
                }
                self.start()?;
            }
            EnumeratorState::Running | EnumeratorState::Suspended => {}
        }

        self.current = None;
        self.state = EnumeratorState::Running;

        let channel = Arc::clone(&self.run.channel);
        let run_signal = self.run.signal.clone();
        let delivery = tokio::select! {
            biased;
            _ = signal.cancelled() => Err(SequenceError::Cancelled),
            _ = run_signal.cancelled() => Err(SequenceError::Cancelled),
            delivery = channel.request_next() => delivery,
        };

        match delivery {
            Ok(Some(value)) => {
                self.current = Some(value);
                self.delivered += 1;
                self.state = EnumeratorState::Suspended;
                trace!(
                    enumerator_id = self.id.as_u64(),
                    delivered = self.delivered,
                    "Value delivered"
                );
                Ok(true)
            }
            Ok(None) => {
                self.join_task().await;
                self.state = EnumeratorState::Completed;
                debug!(
                    enumerator_id = self.id.as_u64(),
                    delivered = self.run.channel.delivered(),
                    "Routine completed"
                );
                Ok(false)
            }
            Err(err @ (SequenceError::RoutineFailure(_) | SequenceError::ProtocolViolation(_))) => {
                self.join_task().await;
                self.failure = Some(err.clone());
                self.state = EnumeratorState::Faulted;
                debug!(
                    enumerator_id = self.id.as_u64(),
                    delivered = self.delivered,
                    error = %err,
                    "Routine faulted"
                );
                Err(err)
            }
            Err(err) => {
                self.cancel_run().await;
                Err(err)
            }
        }
    }

    /// Stop the run early.
    ///
    /// Fires the run's cancellation signal, releases whichever side is
    /// parked in the channel and waits for the producer task to unwind. Safe
    /// to call repeatedly; a no-op on finished runs.
    pub async fn dispose(&mut self) {
        if self.state.is_terminal() {
            self.join_task().await;
            return;
        }
        debug!(
            enumerator_id = self.id.as_u64(),
            state = ?self.state,
            channel_phase = ?self.run.channel.phase(),
            delivered = self.delivered,
            "Disposing enumerator"
        );
        self.cancel_run().await;
    }

    /// Discard the current run and start over with a fresh channel on the
    /// next `move_next`. Single-use sequences refuse.
    pub async fn reset(&mut self) -> Result<(), SequenceError> {
        if self.single_use {
            return Err(SequenceError::already_consumed());
        }
        self.dispose().await;
        self.run = Run::new(&self.creation_signal);
        self.state = EnumeratorState::Created;
        self.current = None;
        self.failure = None;
        self.delivered = 0;
        debug!(enumerator_id = self.id.as_u64(), "Enumerator reset");
        Ok(())
    }

    /// Consume the enumerator as a stream of values. The stream ends after
    /// the routine completes or after yielding the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, SequenceError>> + Send {
        futures::stream::unfold(Some(self), |enumerator| async move {
            let mut enumerator = enumerator?;
            let none = CancellationSignal::none();
            let step = enumerator.move_next(&none).await;
            match step {
                Ok(true) => {
                    // A successful move_next always leaves a current value.
                    debug_assert!(enumerator.current().is_some());
                    let value = enumerator.take_current()?;
                    Some((Ok(value), Some(enumerator)))
                }
                Ok(false) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    fn start(&mut self) -> Result<(), SequenceError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            SequenceError::UsageError("enumerators must be driven inside a tokio runtime".to_string())
        })?;

        let emitter = Emitter::new(Arc::clone(&self.run.channel), self.run.signal.clone());
        let producer = Arc::clone(&self.producer);
        let channel = Arc::clone(&self.run.channel);
        let signal = self.run.signal.clone();
        let id = self.id;

        self.run.task = Some(handle.spawn(async move {
            let routine = AssertUnwindSafe(producer.produce(emitter)).catch_unwind();
            let outcome = tokio::select! {
                biased;
                _ = signal.cancelled() => None,
                outcome = routine => Some(outcome),
            };
            match outcome {
                None => {
                    channel.cancel();
                    trace!(enumerator_id = id.as_u64(), "Routine dropped on cancellation");
                }
                Some(Ok(Ok(()))) => channel.close(Ok(())),
                Some(Ok(Err(err))) => {
                    if signal.is_cancelled() {
                        channel.cancel();
                        return;
                    }
                    // Channel errors propagated with `?` keep their own kind.
                    match err.downcast_ref::<SequenceError>() {
                        Some(SequenceError::Cancelled) => channel.cancel(),
                        Some(violation @ SequenceError::ProtocolViolation(_)) => {
                            warn!(enumerator_id = id.as_u64(), error = %violation, "Routine broke the emit protocol");
                            channel.close(Err(violation.clone()));
                        }
                        _ => channel.close(Err(SequenceError::RoutineFailure(RoutineError::new(err)))),
                    }
                }
                Some(Err(panic)) => {
                    warn!(enumerator_id = id.as_u64(), "Routine panicked");
                    channel.close(Err(SequenceError::RoutineFailure(RoutineError::from_panic(
                        panic.as_ref(),
                    ))));
                }
            }
        }));

        debug!(enumerator_id = self.id.as_u64(), "Routine started");
        Ok(())
    }

    async fn cancel_run(&mut self) {
        self.run.cancel();
        self.join_task().await;
        self.current = None;
        if self.state != EnumeratorState::Cancelled {
            self.state = EnumeratorState::Cancelled;
            debug!(
                enumerator_id = self.id.as_u64(),
                delivered = self.delivered,
                "Enumerator cancelled"
            );
        }
    }

    async fn join_task(&mut self) {
        let Some(mut task) = self.run.task.take() else {
            return;
        };
        match tokio::time::timeout(self.options.dispose_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(enumerator_id = self.id.as_u64(), error = %err, "Producer task ended abnormally");
            }
            Err(_) => {
                warn!(
                    enumerator_id = self.id.as_u64(),
                    timeout_ms = self.options.dispose_timeout.as_millis() as u64,
                    "Producer task did not unwind in time, aborting"
                );
                task.abort();
            }
        }
    }

    fn stored_failure(&self) -> SequenceError {
        match &self.failure {
            Some(err) => err.clone(),
            None => SequenceError::ProtocolViolation("faulted enumerator lost its failure".to_string()),
        }
    }
}

impl<T: Send + 'static> Drop for Enumerator<T> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.run.cancel();
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Enumerator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enumerator")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("single_use", &self.single_use)
            .field("delivered", &self.delivered)
            .finish()
    }
}
