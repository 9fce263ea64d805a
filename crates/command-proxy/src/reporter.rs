//! Structured reporting for session events.
//!
//! Reporters are write-only observers: the session never reads anything back
//! from them, so correctness does not depend on the logging sink.

use std::sync::Arc;
use std::time::Duration;

use crate::command::{CommandSpec, Outcome};
use crate::session::{SESSION_TARGET, SessionError};

/// Observer trait used to surface session events to telemetry sinks.
pub trait SessionReporter: Send + Sync {
    /// Invoked after a request decodes, before the command starts.
    fn command_started(&self, spec: &CommandSpec);

    /// Invoked once the executor has classified the command.
    fn command_finished(&self, spec: &CommandSpec, outcome: &Outcome, elapsed: Duration);

    /// Invoked when a session aborts without sending a result.
    fn session_failed(&self, error: &SessionError);
}

impl<T> SessionReporter for Arc<T>
where
    T: SessionReporter,
{
    fn command_started(&self, spec: &CommandSpec) {
        (**self).command_started(spec);
    }

    fn command_finished(&self, spec: &CommandSpec, outcome: &Outcome, elapsed: Duration) {
        (**self).command_finished(spec, outcome, elapsed);
    }

    fn session_failed(&self, error: &SessionError) {
        (**self).session_failed(error);
    }
}

/// Default reporter that records session events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredSessionReporter;

impl StructuredSessionReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SessionReporter for StructuredSessionReporter {
    fn command_started(&self, spec: &CommandSpec) {
        tracing::info!(
            target: SESSION_TARGET,
            event = "command_started",
            executable = spec.executable(),
            arguments = ?spec.arguments(),
            stdin_bytes = spec.stdin_payload().map_or(0, str::len),
            timeout = %spec.timeout(),
            "run command"
        );
    }

    fn command_finished(&self, spec: &CommandSpec, outcome: &Outcome, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Outcome::Completed { stdout } => tracing::info!(
                target: SESSION_TARGET,
                event = "command_finished",
                executable = spec.executable(),
                outcome = outcome.kind(),
                exit_code = outcome.exit_code(),
                output_bytes = stdout.len(),
                elapsed_ms,
                "command completed"
            ),
            Outcome::FailedExit { stderr, .. } => tracing::info!(
                target: SESSION_TARGET,
                event = "command_finished",
                executable = spec.executable(),
                outcome = outcome.kind(),
                exit_code = outcome.exit_code(),
                output_bytes = stderr.len(),
                elapsed_ms,
                "command exited with failure"
            ),
            Outcome::ExecutionError { fault } => tracing::warn!(
                target: SESSION_TARGET,
                event = "command_finished",
                executable = spec.executable(),
                outcome = outcome.kind(),
                exit_code = outcome.exit_code(),
                error = %fault,
                elapsed_ms,
                "command could not be executed"
            ),
        }
    }

    fn session_failed(&self, error: &SessionError) {
        tracing::error!(
            target: SESSION_TARGET,
            event = "session_failed",
            stage = error.stage(),
            error = %error,
            "session aborted"
        );
    }
}
