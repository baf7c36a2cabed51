//! Error taxonomy for the chat routing layer.

use std::time::Duration;

/// Failures surfaced by routing operations and collaborator adapters.
///
/// Collaborator failures are caught at the operation boundary and logged; only
/// `Busy` travels back to the caller of a submit operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Submitted text was empty after trimming.
    #[error("input is empty")]
    EmptyInput,

    /// A request is already in flight (or the queue is full).
    #[error("assistant is busy with another request")]
    Busy,

    /// The response engine raised an error.
    #[error("engine error: {0}")]
    EngineFailure(String),

    /// The response engine did not answer in time.
    #[error("engine timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// Persisting a message failed.
    #[error("store error: {0}")]
    StoreFailure(String),

    /// Reading today's history failed.
    #[error("history load error: {0}")]
    LoadFailure(String),
}

/// Convenience result type for routing operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;
