//! Blocking iteration adapter.
//!
//! Compatibility path for synchronous callers: a plain [`Iterator`] that
//! blocks the calling thread on every step. It owns a private tokio runtime
//! to drive the producer task and offers no concurrency benefit over the
//! asynchronous API. It works on plain threads and on
//! `tokio::task::spawn_blocking` threads, and refuses to block an async
//! worker, where it would stall other tasks.

use crate::cancel::CancellationSignal;
use crate::config::BlockingConfig;
use crate::enumerator::Enumerator;
use crate::error::SequenceError;
use crate::sequence::Sequence;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, warn};

/// Blocking iterator over one run of a [`Sequence`].
///
/// Yields `Ok(value)` per emitted value, then ends. A routine failure or
/// cancellation is yielded once as `Err` and ends the iteration. Dropping the
/// iterator disposes the underlying enumerator.
#[derive(Debug)]
pub struct BlockingIter<T: Send + 'static> {
    enumerator: Option<Enumerator<T>>,
    done: bool,
    // Taken in drop, after the enumerator has been disposed.
    runtime: Option<Runtime>,
}

impl<T: Send + 'static> Sequence<T> {
    /// Iterate synchronously using a current-thread runtime.
    pub fn blocking_iter(&self) -> Result<BlockingIter<T>, SequenceError> {
        self.blocking_iter_with(&BlockingConfig::default())
    }

    pub fn blocking_iter_with(
        &self,
        config: &BlockingConfig,
    ) -> Result<BlockingIter<T>, SequenceError> {
        let runtime = build_runtime(config)?;
        let created = block_on(&runtime, self.get_enumerator(&CancellationSignal::none()));
        let enumerator = match created {
            Ok(Ok(enumerator)) => enumerator,
            Ok(Err(err)) | Err(err) => {
                runtime.shutdown_background();
                return Err(err);
            }
        };
        debug!(
            enumerator_id = enumerator.id().as_u64(),
            worker_threads = config.worker_threads,
            "Blocking iterator created"
        );
        Ok(BlockingIter {
            enumerator: Some(enumerator),
            done: false,
            runtime: Some(runtime),
        })
    }
}

fn build_runtime(config: &BlockingConfig) -> Result<Runtime, SequenceError> {
    let mut builder = if config.worker_threads == 0 {
        Builder::new_current_thread()
    } else {
        Builder::new_multi_thread()
    };
    if config.worker_threads > 0 {
        builder.worker_threads(config.worker_threads);
    }
    builder
        .thread_name(config.thread_name.clone())
        .enable_time()
        .build()
        .map_err(|e| SequenceError::Config(format!("Failed to build blocking runtime: {}", e)))
}

/// Drive `future` to completion on `runtime`.
///
/// tokio refuses to block a thread that is already driving async tasks, and
/// there is no public query for that, so the refusal is caught and reported
/// as a usage error. Threads that merely carry a runtime handle, such as
/// `spawn_blocking` threads, block normally.
fn block_on<F: Future>(runtime: &Runtime, future: F) -> Result<F::Output, SequenceError> {
    if Handle::try_current().is_err() {
        return Ok(runtime.block_on(future));
    }
    panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(future))).map_err(|_| {
        SequenceError::UsageError(
            "blocking iteration cannot run on an async runtime worker".to_string(),
        )
    })
}

impl<T: Send + 'static> Iterator for BlockingIter<T> {
    type Item = Result<T, SequenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let runtime = self.runtime.as_ref()?;
        let enumerator = self.enumerator.as_mut()?;
        let step = block_on(runtime, enumerator.move_next(&CancellationSignal::none()))
            .and_then(|step| step);
        match step {
            Ok(true) => enumerator.take_current().map(Ok),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<T: Send + 'static> Drop for BlockingIter<T> {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if let Some(mut enumerator) = self.enumerator.take() {
            // Blocking while already unwinding would abort the process.
            if !std::thread::panicking() && block_on(&runtime, enumerator.dispose()).is_err() {
                // Dropped on an async worker: the enumerator's own drop
                // cancels the run without waiting.
                warn!(
                    enumerator_id = enumerator.id().as_u64(),
                    "Blocking iterator dropped on an async worker, producer not awaited"
                );
            }
        }
        // Never blocks, so it is safe from any context.
        runtime.shutdown_background();
    }
}
