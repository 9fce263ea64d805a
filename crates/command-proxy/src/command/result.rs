//! Wire result and its encoder.

use std::io::Write;

use serde::{Deserialize, Serialize};

use super::errors::EncodeError;
use super::outcome::Outcome;

/// The response sent back for a decoded request.
///
/// The outcome variant is not transmitted; it is only visible through the
/// `exit_code`/`output` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status, or 1 for execution faults.
    pub exit_code: i32,
    /// Stdout on success, stderr on non-zero exit, or a fault description.
    pub output: String,
}

impl CommandResult {
    /// Writes the result as a single JSON line and flushes the writer.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Write`] when the writer fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), EncodeError> {
        let mut line =
            serde_json::to_vec(self).map_err(|source| EncodeError::Serialize { source })?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .and_then(|()| writer.flush())
            .map_err(|source| EncodeError::Write { source })
    }
}

impl From<Outcome> for CommandResult {
    fn from(outcome: Outcome) -> Self {
        let exit_code = outcome.exit_code();
        let output = match outcome {
            Outcome::Completed { stdout } => stdout,
            Outcome::FailedExit { stderr, .. } => stderr,
            Outcome::ExecutionError { fault } => fault.to_string(),
        };
        Self { exit_code, output }
    }
}
