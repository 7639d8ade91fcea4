//! Error types for bearer-dispatch.

use thiserror::Error;

/// Main error type for codec, transaction and engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O error on the peer socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A decode ran past the end of the payload.
    #[error("Truncated frame: needed {needed} bytes, {remaining} remaining")]
    TruncatedFrame { needed: usize, remaining: usize },

    /// Framing or message-level protocol violation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An operation referenced a transaction id that is not pending.
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(u8),

    /// A collaborator call failed or the collaborator is absent.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A request carried a value the engine cannot act on.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A transaction was already completed.
    #[error("Transaction {0} already terminated")]
    AlreadyTerminal(u8),

    /// The dispatch queue or writer task is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The outbound queue is at capacity.
    #[error("Outbound queue full")]
    QueueFull,

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
