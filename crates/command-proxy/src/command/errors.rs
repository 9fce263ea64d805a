//! Errors raised while decoding requests, running commands, and encoding
//! results.
//!
//! Only [`DecodeError`] and [`EncodeError`] ever leave a session.
//! [`ExecutionFault`] is folded into the outcome reported to the caller.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use super::spec::Timeout;

/// Failure to read a command request from the input stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stream ended before any request value was read.
    #[error("request stream closed before a command was received")]
    Closed,

    /// The request was not a well-formed command object.
    #[error("malformed command request: {source}")]
    Malformed {
        /// Underlying JSON error, including truncated input.
        #[source]
        source: serde_json::Error,
    },

    /// Reading from the stream failed.
    #[error("failed to read command request: {source}")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(source: serde_json::Error) -> Self {
        if source.is_io() {
            Self::Io {
                source: io::Error::from(source),
            }
        } else {
            Self::Malformed { source }
        }
    }
}

/// Failure to write a command result to the output stream.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The result could not be serialised.
    #[error("failed to serialise command result: {source}")]
    Serialize {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Writing or flushing the stream failed, typically because the peer
    /// disconnected.
    #[error("failed to write command result: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Reasons a command produced no well-defined exit status.
///
/// I/O errors are wrapped in `Arc` so outcomes stay cloneable.
#[derive(Debug, Clone, Error)]
pub enum ExecutionFault {
    /// The executable could not be started (missing, not executable, ...).
    #[error("failed to start '{executable}': {source}")]
    StartFailed {
        /// Executable that was requested.
        executable: String,
        /// Underlying spawn error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The deadline elapsed and the process was killed.
    #[error("command timed out after {timeout}")]
    DeadlineExceeded {
        /// Timeout the deadline was derived from.
        timeout: Timeout,
    },

    /// The deadline was cancelled before the command finished.
    #[error("command was cancelled before completion")]
    Cancelled,

    /// The process ended without an exit code, e.g. killed by a signal.
    #[error("command terminated abnormally ({status})")]
    Terminated {
        /// Platform description of the exit status.
        status: String,
    },

    /// Waiting on the process or collecting its output failed.
    #[error("failed to supervise command: {source}")]
    Supervision {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}
