//! CLI module for kernelgate
//!
//! Provides command-line interface for:
//! - serve: Boot the gateway on its single port
//! - token: Mint a signed token for scripting and tests

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{run, run_command, serve, token};
pub use errors::{CliError, CliErrorCode, CliResult, EXIT_CODE_UNAVAILABLE_PORT};
