//! Child-process execution under a deadline.
//!
//! [`ProcessExecutor`] spawns the requested program with its output streams
//! piped, feeds the optional stdin payload from a writer thread, drains
//! stdout and stderr on two reader threads, and polls the child until it
//! exits or the [`Deadline`] expires. On Unix the child leads its own process
//! group, so a timeout kills every process the command started and the
//! reader threads see end-of-file.
//!
//! The exit status of the direct child decides the outcome. When it exits in
//! time but a background descendant keeps an output pipe open past the
//! deadline, the group is killed and the output captured so far is kept.
//!
//! Every path out of the executor releases the child: [`ChildGuard`] kills and
//! reaps a process that is still running when it is dropped.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::deadline::Deadline;
use super::errors::ExecutionFault;
use super::outcome::Outcome;
use super::spec::CommandSpec;
use super::COMMAND_TARGET;

/// Interval between exit-status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Time the reader threads get to see end-of-file after a late group kill.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Runs a [`CommandSpec`] and classifies how it concluded.
///
/// Implementations never fail: faults are reported as
/// [`Outcome::ExecutionError`]. Test code can implement this trait to return
/// canned outcomes without spawning processes.
pub trait CommandExecutor: Send + Sync {
    /// Executes `spec`, killing it once `deadline` expires.
    fn execute(&self, spec: &CommandSpec, deadline: &Deadline) -> Outcome;
}

impl<T> CommandExecutor for Arc<T>
where
    T: CommandExecutor + ?Sized,
{
    fn execute(&self, spec: &CommandSpec, deadline: &Deadline) -> Outcome {
        (**self).execute(spec, deadline)
    }
}

/// Executes commands as operating-system child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Builds an executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run(spec: &CommandSpec, deadline: &Deadline) -> Result<Outcome, ExecutionFault> {
        if deadline.is_expired() {
            debug!(
                target: COMMAND_TARGET,
                executable = spec.executable(),
                timeout = %deadline.timeout(),
                "deadline expired before spawn"
            );
            return Err(expiry_fault(deadline));
        }

        let mut guard = spawn(spec)?;
        if let Some(payload) = spec.stdin_payload()
            && let Some(stdin) = guard.child.stdin.take()
        {
            feed_stdin(stdin, payload.to_owned());
        }

        let (sender, receiver) = mpsc::channel();
        let stdout = capture(Stream::Stdout, guard.child.stdout.take(), sender.clone());
        let stderr = capture(Stream::Stderr, guard.child.stderr.take(), sender);

        let status = Self::wait_for_exit(&mut guard, deadline)?;
        if let Drain::Expired = Self::drain(&receiver, Some(deadline))? {
            warn!(
                target: COMMAND_TARGET,
                timeout = %deadline.timeout(),
                %status,
                "command output still open at deadline, killing process group"
            );
            guard.terminate();
            if let Drain::Expired = Self::drain(&receiver, None)? {
                debug!(
                    target: COMMAND_TARGET,
                    "output pipes still open after kill, keeping partial output"
                );
            }
        }
        let output = CapturedOutput {
            stdout: stdout.take(),
            stderr: stderr.take(),
        };
        Ok(classify(spec, status, output))
    }

    fn wait_for_exit(
        guard: &mut ChildGuard,
        deadline: &Deadline,
    ) -> Result<ExitStatus, ExecutionFault> {
        loop {
            match guard.try_wait() {
                Ok(Some(status)) => {
                    debug!(
                        target: COMMAND_TARGET,
                        pid = guard.child.id(),
                        %status,
                        "command process exited"
                    );
                    return Ok(status);
                }
                Ok(None) if deadline.is_expired() => {
                    warn!(
                        target: COMMAND_TARGET,
                        pid = guard.child.id(),
                        timeout = %deadline.timeout(),
                        cancelled = deadline.is_cancelled(),
                        "command deadline elapsed, killing process"
                    );
                    guard.terminate();
                    return Err(expiry_fault(deadline));
                }
                Ok(None) => thread::sleep(deadline.remaining().min(POLL_INTERVAL)),
                Err(source) => {
                    guard.terminate();
                    return Err(ExecutionFault::Supervision {
                        source: Arc::new(source),
                    });
                }
            }
        }
    }

    /// Waits for both reader threads to reach end-of-file, up to `deadline`
    /// or, without one, for [`DRAIN_GRACE`].
    fn drain(
        receiver: &Receiver<Capture>,
        deadline: Option<&Deadline>,
    ) -> Result<Drain, ExecutionFault> {
        let grace_ends = Instant::now() + DRAIN_GRACE;
        let mut open = 2_u8;
        while open > 0 {
            let wait = deadline.map_or_else(
                || grace_ends.saturating_duration_since(Instant::now()),
                Deadline::remaining,
            );
            match receiver.recv_timeout(wait.min(POLL_INTERVAL)) {
                Ok(Capture { stream, result }) => {
                    result.map_err(|source| ExecutionFault::Supervision {
                        source: Arc::new(source),
                    })?;
                    debug!(target: COMMAND_TARGET, ?stream, "command output closed");
                    open -= 1;
                }
                Err(RecvTimeoutError::Timeout) if wait.is_zero() => return Ok(Drain::Expired),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ExecutionFault::Supervision {
                        source: Arc::new(io::Error::other("output capture ended unexpectedly")),
                    });
                }
            }
        }
        Ok(Drain::Complete)
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute(&self, spec: &CommandSpec, deadline: &Deadline) -> Outcome {
        Self::run(spec, deadline).unwrap_or_else(Outcome::from)
    }
}

fn spawn(spec: &CommandSpec) -> Result<ChildGuard, ExecutionFault> {
    let mut command = Command::new(spec.executable());
    command.args(spec.arguments());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    if spec.stdin_payload().is_some() {
        command.stdin(Stdio::piped());
    } else {
        command.stdin(Stdio::null());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    debug!(
        target: COMMAND_TARGET,
        executable = spec.executable(),
        arguments = ?spec.arguments(),
        "spawning command process"
    );

    command
        .spawn()
        .map(ChildGuard::new)
        .map_err(|source| ExecutionFault::StartFailed {
            executable: spec.executable().to_owned(),
            source: Arc::new(source),
        })
}

/// Writes the payload on a separate thread and closes the pipe.
fn feed_stdin(mut stdin: ChildStdin, payload: String) {
    thread::spawn(move || {
        // A child that exits without reading its input is not an error.
        if let Err(error) = stdin.write_all(payload.as_bytes())
            && error.kind() != io::ErrorKind::BrokenPipe
        {
            debug!(
                target: COMMAND_TARGET,
                error = %error,
                "failed to write command stdin"
            );
        }
    });
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// End-of-stream notice from a reader thread.
struct Capture {
    stream: Stream,
    result: io::Result<()>,
}

enum Drain {
    Complete,
    Expired,
}

/// Bytes read from one pipe so far, shared with its reader thread.
#[derive(Clone, Default)]
struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

struct CapturedOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Drains one output pipe on its own thread into a shared buffer and reports
/// end-of-file on `sender`.
fn capture<R>(stream: Stream, pipe: Option<R>, sender: Sender<Capture>) -> CaptureBuffer
where
    R: Read + Send + 'static,
{
    let buffer = CaptureBuffer::default();
    let sink = buffer.clone();
    thread::spawn(move || {
        let result = pipe.map_or(Ok(()), |reader| copy_into(reader, &sink));
        // The receiver is gone once the executor has given up on the command.
        drop(sender.send(Capture { stream, result }));
    });
    buffer
}

fn copy_into<R: Read>(mut reader: R, sink: &CaptureBuffer) -> io::Result<()> {
    let mut chunk = [0_u8; 8192];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(read) => sink.append(&chunk[..read]),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}

fn classify(spec: &CommandSpec, status: ExitStatus, output: CapturedOutput) -> Outcome {
    match status.code() {
        Some(0) => Outcome::Completed {
            stdout: into_text(output.stdout),
        },
        Some(code) => {
            let stderr = into_text(output.stderr);
            debug!(
                target: COMMAND_TARGET,
                executable = spec.executable(),
                exit_code = code,
                stdout = %String::from_utf8_lossy(&output.stdout),
                stderr = %stderr,
                "command exited with non-zero status"
            );
            Outcome::FailedExit { code, stderr }
        }
        None => Outcome::from(ExecutionFault::Terminated {
            status: status.to_string(),
        }),
    }
}

fn into_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned())
}

fn expiry_fault(deadline: &Deadline) -> ExecutionFault {
    if deadline.is_cancelled() {
        ExecutionFault::Cancelled
    } else {
        ExecutionFault::DeadlineExceeded {
            timeout: deadline.timeout(),
        }
    }
}

/// Exclusive owner of a spawned child.
///
/// Dropping the guard kills the child's process group and reaps the child if
/// it has not already been waited on.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    const fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Kills the process group (and the child itself) and reaps the child.
    fn terminate(&mut self) {
        #[cfg(unix)]
        kill_process_group(self.child.id());

        if self.reaped {
            return;
        }
        drop(self.child.kill());
        if let Err(error) = self.child.wait() {
            warn!(
                target: COMMAND_TARGET,
                pid = self.child.id(),
                error = %error,
                "failed to reap command process"
            );
        }
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.terminate();
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(errno) => debug!(
            target: COMMAND_TARGET,
            pid,
            error = %errno,
            "failed to signal command process group"
        ),
    }
}
