//! kernelgate CLI entry point
//!
//! Parses arguments via `cli::run`, prints errors to stderr and exits with
//! the error's code. An unavailable port exits with its own code.

use kernelgate::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}
