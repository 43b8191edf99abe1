/// Error types for the zenoh-duel library
use thiserror::Error;

/// Result type alias for duel operations
pub type Result<T> = std::result::Result<T, DuelError>;

/// Errors that can occur in zenoh-duel operations
#[derive(Debug, Error)]
pub enum DuelError {
    /// Zenoh-related errors
    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    /// Invalid peer id provided
    #[error("Invalid peer id: {0}. Must be a valid single-chunk keyexpr (no /, *, $, ?, #, @)")]
    InvalidPeerId(String),

    /// Invalid keyexpr pattern
    #[error("Invalid keyexpr: {0}")]
    InvalidKeyexpr(String),

    /// A connection (pending or established) already exists
    #[error("Already connected to peer '{0}'")]
    AlreadyConnected(String),

    /// Attempt to connect to our own identity
    #[error("Cannot connect to self ('{0}')")]
    SelfConnection(String),

    /// Operation requires an established connection
    #[error("Not connected")]
    NotConnected,

    /// Remote peer refused the connection
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    /// Invalid state transition attempted
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition {
        /// Current state
        from: String,
        /// Attempted target state
        to: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DuelError {
    fn from(e: serde_json::Error) -> Self {
        DuelError::Serialization(e.to_string())
    }
}
