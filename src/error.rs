//! Error types for stepwise sequences.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised inside a production routine.
///
/// Cloning is cheap and every clone refers to the same underlying error, so a
/// faulted enumerator can hand the identical failure back on each later call.
#[derive(Clone)]
pub struct RoutineError(Arc<anyhow::Error>);

impl RoutineError {
    pub fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }

    /// Build a routine failure from a panic payload caught by the producer task.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(anyhow::anyhow!("routine panicked: {}", message))
    }

    /// Borrow the wrapped error, e.g. to `downcast_ref` a caller-defined type.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// True when both values share the same underlying failure.
    pub fn same_failure(&self, other: &RoutineError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RoutineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for RoutineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// Errors surfaced by sequences, enumerators and the value channel.
#[derive(Debug, Clone, Error)]
pub enum SequenceError {
    /// Caller broke the hand-off protocol (programmer error).
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Routine failed: {0}")]
    RoutineFailure(RoutineError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Usage error: {0}")]
    UsageError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SequenceError {
    pub(crate) fn already_consumed() -> Self {
        SequenceError::UsageError("single-use sequence already consumed".to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SequenceError::Cancelled)
    }
}

impl From<config::ConfigError> for SequenceError {
    fn from(err: config::ConfigError) -> Self {
        SequenceError::Config(err.to_string())
    }
}
