//! One request/response exchange over a duplex stream.
//!
//! A session decodes a single [`CommandSpec`], executes it, and writes back
//! exactly one [`CommandResult`]. Execution faults become ordinary results;
//! only decode and write failures abort the session, in which case nothing
//! (or nothing complete) is written and the error is returned to the host.
//!
//! Sessions share no mutable state. The listener hands every accepted
//! connection to [`Session::handle`] on its own thread.

use std::fmt;
use std::io::{Read, Write};
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::command::{
    CommandExecutor, CommandResult, CommandSpec, Deadline, DecodeError, EncodeError,
};
use crate::reporter::{SessionReporter, StructuredSessionReporter};
use crate::transport::{ConnectionHandler, ConnectionStream};

/// Tracing target shared by session lifecycle and reporter events.
pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::session");

/// Lifecycle of a single session. No state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been read yet.
    Idle,
    /// Reading the request.
    Decoding,
    /// Running the command.
    Executing,
    /// Writing the result.
    Encoding,
    /// The result was written.
    Done,
    /// Decoding or encoding failed.
    Aborted,
}

impl SessionState {
    /// Lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Decoding => "decoding",
            Self::Executing => "executing",
            Self::Encoding => "encoding",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }

    /// Whether the session has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors that end a session without a complete result.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The request could not be decoded; the command never ran.
    #[error("failed to decode request: {source}")]
    Decode {
        /// Underlying decode error.
        #[source]
        source: DecodeError,
    },
    /// The result could not be written back.
    #[error("failed to send result: {source}")]
    Encode {
        /// Underlying encode error.
        #[source]
        source: EncodeError,
    },
}

impl SessionError {
    /// State the session was in when it aborted.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Decode { .. } => SessionState::Decoding.as_str(),
            Self::Encode { .. } => SessionState::Encoding.as_str(),
        }
    }
}

impl From<DecodeError> for SessionError {
    fn from(source: DecodeError) -> Self {
        Self::Decode { source }
    }
}

impl From<EncodeError> for SessionError {
    fn from(source: EncodeError) -> Self {
        Self::Encode { source }
    }
}

/// Runs decode, execute and encode for one stream at a time.
///
/// A `Session` holds only immutable collaborators, so one instance can serve
/// any number of streams concurrently.
#[derive(Debug)]
pub struct Session<E, R = StructuredSessionReporter> {
    executor: E,
    reporter: R,
}

impl<E> Session<E> {
    /// Creates a session that reports through `tracing`.
    #[must_use]
    pub const fn new(executor: E) -> Self {
        Self::with_reporter(executor, StructuredSessionReporter::new())
    }
}

impl<E, R> Session<E, R> {
    /// Creates a session with a custom reporter.
    #[must_use]
    pub const fn with_reporter(executor: E, reporter: R) -> Self {
        Self { executor, reporter }
    }
}

impl<E, R> Session<E, R>
where
    E: CommandExecutor,
    R: SessionReporter,
{
    /// Serves exactly one request from `stream` and returns the result sent.
    ///
    /// The stream is read up to the end of the request object only, and the
    /// result is flushed before returning. Closing the stream is left to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Decode`] when no valid request arrives (the
    /// executor is not invoked and nothing is written), or
    /// [`SessionError::Encode`] when the result cannot be written.
    pub fn run<S>(&self, stream: &mut S) -> Result<CommandResult, SessionError>
    where
        S: Read + Write,
    {
        let mut tracker = StateTracker::default();
        let result = self.exchange(stream, &mut tracker);
        if let Err(error) = &result {
            tracker.advance(SessionState::Aborted);
            self.reporter.session_failed(error);
        }
        result
    }

    fn exchange<S>(
        &self,
        stream: &mut S,
        tracker: &mut StateTracker,
    ) -> Result<CommandResult, SessionError>
    where
        S: Read + Write,
    {
        tracker.advance(SessionState::Decoding);
        let spec = CommandSpec::decode(&mut *stream)?;
        self.reporter.command_started(&spec);

        tracker.advance(SessionState::Executing);
        let started = Instant::now();
        let deadline = Deadline::start(spec.timeout());
        let outcome = self.executor.execute(&spec, &deadline);
        self.reporter
            .command_finished(&spec, &outcome, started.elapsed());

        tracker.advance(SessionState::Encoding);
        let result = CommandResult::from(outcome);
        result.write_to(&mut *stream)?;

        tracker.advance(SessionState::Done);
        Ok(result)
    }
}

impl<E, R> ConnectionHandler for Session<E, R>
where
    E: CommandExecutor + 'static,
    R: SessionReporter + 'static,
{
    fn handle(&self, mut stream: ConnectionStream) {
        // Failures are already reported; the connection is simply closed.
        drop(self.run(&mut stream));
        stream.close();
    }
}

#[derive(Debug)]
struct StateTracker {
    state: SessionState,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }
}

impl StateTracker {
    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            !self.state.is_terminal() && self.state != next,
            "session cannot move from {} to {next}",
            self.state
        );
        debug!(
            target: SESSION_TARGET,
            from = %self.state,
            to = %next,
            "session state changed"
        );
        self.state = next;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
