//! Error types for pybox-engine.

use thiserror::Error;

/// Result type alias for pybox-engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur inside the engine.
///
/// These never reach callers of [`Gateway::execute`](crate::Gateway::execute);
/// the gateway normalizes every one of them into diagnostic text.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable interpreter was found.
    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    /// The worker process could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// I/O on a running worker's pipes failed.
    #[error("worker I/O failed: {0}")]
    WorkerIo(#[source] std::io::Error),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
