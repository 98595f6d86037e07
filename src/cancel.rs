//! Cancellation Signal
//!
//! A fire-once signal observable by any number of waiters. Signals can be
//! linked: a child fires whenever any of its parents fires, which is how an
//! enumerator ties the caller's creation signal to its own internal one.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;

struct Inner {
    fired: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn fire(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.fire();
        }
    }
}

/// Cloneable handle to a shared cancellation signal.
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// A signal that never fires unless cancelled directly.
    pub fn none() -> Self {
        Self::new()
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.inner.fire();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Resolve once the signal has fired; immediately if it already has.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag: notify_waiters only reaches
            // futures that exist at the time it runs.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// A new signal that fires when `self` fires (or when cancelled directly).
    pub fn child(&self) -> CancellationSignal {
        let child = CancellationSignal::new();
        self.attach(&child);
        child
    }

    /// A new signal that fires when either `a` or `b` fires.
    pub fn linked(a: &CancellationSignal, b: &CancellationSignal) -> CancellationSignal {
        let composite = CancellationSignal::new();
        a.attach(&composite);
        b.attach(&composite);
        composite
    }

    fn attach(&self, child: &CancellationSignal) {
        {
            let mut children = self.inner.children.lock();
            if !self.is_cancelled() {
                children.retain(|weak| weak.strong_count() > 0);
                children.push(Arc::downgrade(&child.inner));
                return;
            }
        }
        child.cancel();
    }

    #[cfg(test)]
    fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
