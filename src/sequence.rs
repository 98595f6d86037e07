//! Sequence Factory
//!
//! A [`Sequence`] pairs a production routine with a single-use flag. Each
//! [`Sequence::get_enumerator`] call yields a fresh [`Enumerator`] running its
//! own instance of the routine; single-use sequences yield exactly one.

use crate::cancel::CancellationSignal;
use crate::channel::Emitter;
use crate::enumerator::{Enumerator, EnumeratorOptions};
use crate::error::SequenceError;
use crate::producer::{FnProducer, Producer};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Restartable (or one-shot) asynchronous sequence.
///
/// ```no_run
/// use stepwise::{CancellationSignal, Sequence};
///
/// # async fn demo() -> Result<(), stepwise::SequenceError> {
/// let numbers = Sequence::new(|emitter| async move {
///     for i in 1..=5 {
///         emitter.emit(i).await?;
///     }
///     Ok(())
/// });
///
/// let signal = CancellationSignal::none();
/// let mut enumerator = numbers.get_enumerator(&signal).await?;
/// while enumerator.move_next(&signal).await? {
///     println!("{}", enumerator.current().unwrap());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Sequence<T: Send + 'static> {
    producer: Arc<dyn Producer<T>>,
    single_use: bool,
    exhausted: Arc<AtomicBool>,
    options: EnumeratorOptions,
}

impl<T: Send + 'static> Clone for Sequence<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            single_use: self.single_use,
            exhausted: Arc::clone(&self.exhausted),
            options: self.options.clone(),
        }
    }
}

impl<T: Send + 'static> Sequence<T> {
    /// Build a sequence from an async closure that emits values.
    pub fn new<F, Fut>(routine: F) -> Self
    where
        F: Fn(Emitter<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::from_producer(FnProducer(routine))
    }

    /// Build a sequence from a [`Producer`] implementation.
    pub fn from_producer<P: Producer<T>>(producer: P) -> Self {
        Self {
            producer: Arc::new(producer),
            single_use: false,
            exhausted: Arc::new(AtomicBool::new(false)),
            options: EnumeratorOptions::default(),
        }
    }

    /// Sequence that completes without emitting anything.
    pub fn empty() -> Self {
        Self::new(|_emitter: Emitter<T>| async { Ok(()) })
    }

    /// Allow only one enumerator, ever. Clones share the restriction.
    pub fn single_use(mut self) -> Self {
        self.single_use = true;
        self
    }

    pub fn with_options(mut self, options: EnumeratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn is_single_use(&self) -> bool {
        self.single_use
    }

    /// True once a single-use sequence has handed out its enumerator.
    pub fn is_exhausted(&self) -> bool {
        self.single_use && self.exhausted.load(Ordering::Acquire)
    }

    /// Create an enumerator for a fresh run of the routine.
    ///
    /// The enumerator's run is cancelled whenever `signal` fires. Fails with
    /// [`SequenceError::Cancelled`] if `signal` has already fired, and with
    /// [`SequenceError::UsageError`] on a consumed single-use sequence.
    pub async fn get_enumerator(
        &self,
        signal: &CancellationSignal,
    ) -> Result<Enumerator<T>, SequenceError> {
        if signal.is_cancelled() {
            return Err(SequenceError::Cancelled);
        }
        if self.single_use
            && self
                .exhausted
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            warn!("Enumerator requested from an exhausted single-use sequence");
            return Err(SequenceError::already_consumed());
        }
        Ok(Enumerator::new(
            Arc::clone(&self.producer),
            self.single_use,
            self.options.clone(),
            signal,
        ))
    }

    /// Drain a fresh run, handing each value to `f`. Returns the number of
    /// values seen.
    pub async fn for_each<F>(&self, signal: &CancellationSignal, mut f: F) -> Result<u64, SequenceError>
    where
        F: FnMut(T),
    {
        let mut enumerator = self.get_enumerator(signal).await?;
        let result = loop {
            match enumerator.move_next(signal).await {
                Ok(true) => {
                    if let Some(value) = enumerator.take_current() {
                        f(value);
                    }
                }
                Ok(false) => break Ok(enumerator.delivered()),
                Err(err) => break Err(err),
            }
        };
        enumerator.dispose().await;
        debug!(enumerator_id = enumerator.id().as_u64(), ok = result.is_ok(), "Drain finished");
        result
    }

    /// Drain a fresh run into a vector.
    pub async fn collect(&self, signal: &CancellationSignal) -> Result<Vec<T>, SequenceError> {
        let mut items = Vec::new();
        self.for_each(signal, |value| items.push(value)).await?;
        Ok(items)
    }
}

impl<T: Clone + Send + Sync + 'static> Sequence<T> {
    /// Sequence that replays an already materialized collection in order.
    pub fn from_vec(items: Vec<T>) -> Self {
        let items = Arc::new(items);
        Self::new(move |emitter: Emitter<T>| {
            let items = Arc::clone(&items);
            async move {
                for item in items.iter() {
                    emitter.emit(item.clone()).await?;
                }
                Ok(())
            }
        })
    }
}

impl<T: Send + 'static> std::fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("single_use", &self.single_use)
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}
