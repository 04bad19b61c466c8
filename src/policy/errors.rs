//! # Policy Errors

use thiserror::Error;

/// Result type for policy checks
pub type PolicyResult<T> = Result<T, PolicyError>;

/// A request rejected by a gateway-wide policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Mutating operation while the workspace is locked
    #[error("Workspace is read-only")]
    ReadOnly,

    /// Verb outside the branch's method set
    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),
}

