//! A command-execution proxy.
//!
//! Each session reads one JSON request naming an executable, its arguments,
//! an optional stdin payload and a timeout; runs the program as a child
//! process; and writes back one JSON result carrying the exit code and the
//! relevant output:
//!
//! - exit status 0 returns captured stdout;
//! - any other status returns that status with captured stderr;
//! - start failures, timeouts and abnormal terminations return exit code 1
//!   with a description of the fault.
//!
//! A child still running at its deadline is killed together with every
//! process it started. Execution faults are ordinary results; only a request
//! that cannot be decoded, or a result that cannot be written, aborts a
//! session.
//!
//! With no `address` configured the proxy serves a single exchange over
//! standard input and output. With an address it accepts TCP or Unix socket
//! connections and runs one independent session per connection until a
//! termination signal arrives.

pub mod command;
mod process;
mod reporter;
mod session;
mod telemetry;
pub mod transport;

pub use process::{
    LaunchError, LaunchMode, ShutdownError, ShutdownSignal, SystemShutdownSignal, run,
    run_with_config,
};
pub use reporter::{SessionReporter, StructuredSessionReporter};
pub use session::{Session, SessionError, SessionState};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
