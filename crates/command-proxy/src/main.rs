//! Entry point for the `command-proxy` binary.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match command_proxy::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed yet, so report directly.
            drop(writeln!(io::stderr(), "command-proxy: {error}"));
            ExitCode::FAILURE
        }
    }
}
