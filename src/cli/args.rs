//! CLI argument definitions using clap
//!
//! Commands:
//! - kernelgate serve [--config <path>] [--port <port>] [--lenient]
//! - kernelgate token --role <role> [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kernelgate - single-port protocol gateway
#[derive(Parser, Debug)]
#[command(name = "kernelgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway
    Serve {
        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,

        /// Keep running without the gateway when the port is unavailable
        #[arg(long)]
        lenient: bool,
    },

    /// Print a signed token for a role
    Token {
        /// visitor, reader, editor or administrator
        #[arg(long)]
        role: String,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Token subject
        #[arg(long)]
        subject: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
