use super::errors::ExecutionFault;

/// Exit code reported for every [`Outcome::ExecutionError`].
pub const EXECUTION_ERROR_EXIT_CODE: i32 = 1;

/// How a command concluded.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Exited with status 0 before the deadline.
    Completed {
        /// Captured standard output.
        stdout: String,
    },
    /// Exited with a non-zero status before the deadline.
    FailedExit {
        /// Process exit status.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },
    /// Could not be started, was killed, or produced no exit status.
    ExecutionError {
        /// What went wrong.
        fault: ExecutionFault,
    },
}

impl Outcome {
    /// Exit code exposed to the caller.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => 0,
            Self::FailedExit { code, .. } => *code,
            Self::ExecutionError { .. } => EXECUTION_ERROR_EXIT_CODE,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::FailedExit { .. } => "failed_exit",
            Self::ExecutionError { .. } => "execution_error",
        }
    }
}

impl From<ExecutionFault> for Outcome {
    fn from(fault: ExecutionFault) -> Self {
        Self::ExecutionError { fault }
    }
}
