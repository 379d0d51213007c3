//! Error types for EventBatcher

use thiserror::Error;

/// Errors that can occur while driving the Engine lifecycle
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is already running")]
    AlreadyStarted,

    #[error("Engine has already been stopped")]
    AlreadyStopped,

    #[error("Engine has no bound transport: {0}")]
    NotBound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed to join: {0}")]
    Join(String),

    #[error("No Tokio runtime to run the Engine on: {0}")]
    NoRuntime(String),
}

/// Errors reported by a message transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport closed")]
    Closed,
}

/// Result type for Engine operations
pub type EngineResult<T> = Result<T, EngineError>;
