//! CLI-specific error types
//!
//! Every CLI error maps to a process exit code. A port that cannot be
//! bound has its own code so supervisors can tell it apart.

use std::fmt;
use std::io;

use crate::auth::AuthError;
use crate::http_server::GatewayError;

/// Exit code for an unavailable listening port
pub const EXIT_CODE_UNAVAILABLE_PORT: i32 = 21;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error
    IoError,
    /// Listening port could not be bound
    UnavailablePort,
    /// Boot failed
    BootFailed,
    /// Token could not be issued
    TokenFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "KG_CLI_CONFIG_ERROR",
            Self::IoError => "KG_CLI_IO_ERROR",
            Self::UnavailablePort => "KG_CLI_UNAVAILABLE_PORT",
            Self::BootFailed => "KG_CLI_BOOT_FAILED",
            Self::TokenFailed => "KG_CLI_TOKEN_FAILED",
        }
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnavailablePort => EXIT_CODE_UNAVAILABLE_PORT,
            _ => 1,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<GatewayError> for CliError {
    fn from(e: GatewayError) -> Self {
        let code = match &e {
            GatewayError::Config(_) => CliErrorCode::ConfigError,
            GatewayError::Bind { .. } => CliErrorCode::UnavailablePort,
            GatewayError::Serve(_) => CliErrorCode::BootFailed,
        };
        Self::new(code, e.to_string())
    }
}

impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        Self::new(CliErrorCode::TokenFailed, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
