//! # Gateway Errors
//!
//! Listener and configuration failures. Per-request failures never surface
//! here: they are answered with an HTTP status.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listening port could not be bound
    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop terminated with an error
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

impl GatewayError {
    /// True when the listener port is taken or otherwise unusable
    pub fn is_port_unavailable(&self) -> bool {
        matches!(self, GatewayError::Bind { .. })
    }
}
