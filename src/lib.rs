//! Stepwise: Demand-Driven Asynchronous Sequences
//!
//! A producer routine emits values one at a time to an asynchronous consumer.
//! The routine runs as its own tokio task and is suspended at every emission
//! until the consumer asks for the next value, so it never runs ahead of
//! demand. Completion, failure and cancellation propagate between the two
//! sides without deadlock.

pub mod blocking;
pub mod cancel;
pub mod channel;
pub mod cli;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod logging;
pub mod producer;
pub mod sequence;

pub use blocking::BlockingIter;
pub use cancel::CancellationSignal;
pub use channel::{Emitter, ValueChannel};
pub use enumerator::{Enumerator, EnumeratorId, EnumeratorOptions, EnumeratorState};
pub use error::{RoutineError, SequenceError};
pub use producer::Producer;
pub use sequence::Sequence;
