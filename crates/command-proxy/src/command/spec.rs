//! Command specifications and the request decoder.
//!
//! A request is a single JSON object:
//!
//! ```json
//! {"executable": "echo", "arguments": ["hello"], "stdin": null, "timeout": 250}
//! ```
//!
//! Only `executable` is required. `timeout` is in milliseconds; zero or an
//! absent value selects [`Timeout::DEFAULT`].

use std::fmt;
use std::io::{BufReader, Read};
use std::time::Duration;

use serde::Deserialize;

use super::errors::DecodeError;

/// Execution time budget in whole milliseconds.
///
/// Negative budgets are preserved as-is and behave as already expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeout {
    millis: i64,
}

impl Timeout {
    /// Budget applied when a request omits the timeout or sends zero.
    pub const DEFAULT: Self = Self::from_millis(1000);

    /// Builds a timeout from a millisecond count.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Normalises the wire value: exactly zero selects the default, anything
    /// else is truncated towards zero to whole milliseconds.
    #[expect(
        clippy::float_cmp,
        clippy::cast_possible_truncation,
        reason = "only an exact zero selects the default; out-of-range values saturate"
    )]
    fn from_wire(value: Option<f64>) -> Self {
        match value {
            None => Self::DEFAULT,
            Some(millis) if millis == 0.0 => Self::DEFAULT,
            Some(millis) => Self::from_millis(millis.trunc() as i64),
        }
    }

    /// Millisecond count.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.millis
    }

    /// Budget as a [`Duration`], or `None` when negative.
    #[must_use]
    pub fn as_duration(self) -> Option<Duration> {
        u64::try_from(self.millis).ok().map(Duration::from_millis)
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}ms", self.millis)
    }
}

/// Wire shape of a request. Unknown fields are ignored and `null` is treated
/// like an absent field.
#[derive(Debug, Deserialize)]
struct CommandRequest {
    executable: String,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default)]
    stdin: Option<String>,
    #[serde(default)]
    timeout: Option<f64>,
}

/// A decoded, normalised description of a command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    executable: String,
    arguments: Vec<String>,
    stdin: Option<String>,
    timeout: Timeout,
}

impl CommandSpec {
    /// Creates a specification with no arguments, no stdin and the default
    /// timeout.
    #[must_use]
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            stdin: None,
            timeout: Timeout::DEFAULT,
        }
    }

    /// Replaces the argument list.
    #[must_use]
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the standard-input payload.
    #[must_use]
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads exactly one request object from `reader`.
    ///
    /// Decoding stops at the end of the first JSON value, so a peer that
    /// keeps its write half open after sending the request is still served.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Closed`] when the stream ends before any value,
    /// [`DecodeError::Malformed`] for syntax errors, type mismatches or a
    /// truncated object, and [`DecodeError::Io`] when reading fails.
    pub fn decode<R: Read>(reader: R) -> Result<Self, DecodeError> {
        let mut values = serde_json::Deserializer::from_reader(BufReader::new(reader))
            .into_iter::<CommandRequest>();
        match values.next() {
            None => Err(DecodeError::Closed),
            Some(Ok(request)) => Ok(Self::from(request)),
            Some(Err(error)) => Err(DecodeError::from(error)),
        }
    }

    /// Program to run.
    #[must_use]
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Raw standard-input field as received.
    #[must_use]
    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Payload to feed the child, or `None` when stdin should stay empty.
    #[must_use]
    pub fn stdin_payload(&self) -> Option<&str> {
        self.stdin().filter(|payload| !payload.is_empty())
    }

    /// Effective timeout.
    #[must_use]
    pub const fn timeout(&self) -> Timeout {
        self.timeout
    }
}

impl From<CommandRequest> for CommandSpec {
    fn from(request: CommandRequest) -> Self {
        Self {
            executable: request.executable,
            arguments: request.arguments.unwrap_or_default(),
            stdin: request.stdin,
            timeout: Timeout::from_wire(request.timeout),
        }
    }
}
