//! CLI command implementations

use std::path::Path;

use chrono::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::{Role, TokenManager};
use crate::http_server::{BootMode, BootOutcome, GatewayConfig, HttpServer};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve {
            config,
            port,
            lenient,
        } => serve(config.as_deref(), port, lenient),
        Command::Token {
            role,
            config,
            subject,
        } => token(config.as_deref(), &role, subject),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
}

/// Start the gateway and serve until the listener stops
///
/// With `lenient` (or `lenient_boot` in the config) an unavailable port is
/// logged and the command returns successfully.
pub fn serve(config_path: Option<&Path>, port: Option<u16>, lenient: bool) -> CliResult<()> {
    init_tracing();

    let mut config = GatewayConfig::load_or_default(config_path)?;
    if let Some(port) = port {
        config.port = port;
    }
    let mode = if lenient || config.lenient_boot {
        BootMode::Lenient
    } else {
        BootMode::Strict
    };

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    let outcome = rt.block_on(async {
        let server = HttpServer::with_config(config);
        server.start(mode).await
    })?;

    if outcome == BootOutcome::Skipped {
        info!("gateway not started");
    }
    Ok(())
}

/// Print a signed token for `role`
pub fn token(config_path: Option<&Path>, role: &str, subject: Option<String>) -> CliResult<()> {
    let config = GatewayConfig::load_or_default(config_path)?;
    let role: Role = role.parse()?;

    let tokens = TokenManager::new(config.jwt.clone());
    let token = tokens.issue_with_ttl(role, subject, Duration::seconds(config.jwt.ttl_secs))?;
    println!("{}", token);
    Ok(())
}
