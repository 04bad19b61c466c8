//! # Channel Errors
//!
//! Error types for the command channel. Per-message failures (bad input,
//! unknown command, read-only denial) are not errors: they are answered
//! with a Result envelope and the connection stays open.

use thiserror::Error;

use super::connection::ConnectionState;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Admission refused: role not accepted and not an auth-page keep-alive
    #[error("unauthenticated")]
    Unauthenticated,

    /// A lifecycle transition was requested from the wrong state
    #[error("Invalid connection transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Writing to the transport failed
    #[error("Send failed: {0}")]
    SendFailed(String),
}
