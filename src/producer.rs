//! Production routines.
//!
//! A routine receives an [`Emitter`] and pushes values through it one at a
//! time. Closures are the usual way to write one; types that carry their own
//! configuration can implement [`Producer`] directly.

use crate::channel::Emitter;
use async_trait::async_trait;
use std::future::Future;

/// An asynchronous routine that emits a sequence of values.
///
/// `produce` may be called many times (once per enumerator) unless the
/// owning sequence is single-use, so implementations should not assume a
/// single run.
#[async_trait]
pub trait Producer<T: Send + 'static>: Send + Sync + 'static {
    async fn produce(&self, emitter: Emitter<T>) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`Producer`].
pub(crate) struct FnProducer<F>(pub(crate) F);

#[async_trait]
impl<T, F, Fut> Producer<T> for FnProducer<F>
where
    T: Send + 'static,
    F: Fn(Emitter<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn produce(&self, emitter: Emitter<T>) -> anyhow::Result<()> {
        (self.0)(emitter).await
    }
}
