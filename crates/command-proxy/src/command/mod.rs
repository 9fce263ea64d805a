//! The request/response execution pipeline.
//!
//! Raw bytes are decoded into a [`CommandSpec`], executed by a
//! [`CommandExecutor`] into an [`Outcome`], and encoded as a
//! [`CommandResult`]. The [`crate::session`] module composes the three.

mod deadline;
mod errors;
mod executor;
mod outcome;
mod result;
mod spec;

#[cfg(all(test, unix))]
mod executor_tests;

pub use self::deadline::{Deadline, DeadlineCanceller};
pub use self::errors::{DecodeError, EncodeError, ExecutionFault};
pub use self::executor::{CommandExecutor, ProcessExecutor};
pub use self::outcome::{EXECUTION_ERROR_EXIT_CODE, Outcome};
pub use self::result::CommandResult;
pub use self::spec::{CommandSpec, Timeout};

/// Tracing target for command execution.
pub(crate) const COMMAND_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::command");
