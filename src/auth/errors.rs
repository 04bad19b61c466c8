//! # Auth Errors
//!
//! Error types for the authentication module.
//!
//! Credential failures never reach the caller as errors: the resolver
//! degrades them to `Visitor`. These variants surface from the token
//! manager, role parsing and the session store.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // ==================
    // Token Errors
    // ==================
    /// JWT token is malformed
    #[error("Malformed token")]
    MalformedToken,

    /// JWT token has expired
    #[error("Token expired")]
    TokenExpired,

    /// JWT signature is invalid
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Unknown role name
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    // ==================
    // Internal Errors
    // ==================
    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,

    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(String),
}
