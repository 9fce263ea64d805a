//! Unit tests for the session state machine.

use std::io::{self, Cursor, Read, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::command::{ExecutionFault, Outcome, Timeout};

/// Executor returning a canned outcome and counting invocations.
struct StubExecutor {
    outcome: Outcome,
    calls: AtomicUsize,
    seen: Mutex<Vec<CommandSpec>>,
}

impl StubExecutor {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommandExecutor for StubExecutor {
    fn execute(&self, spec: &CommandSpec, _deadline: &Deadline) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("seen lock").push(spec.clone());
        self.outcome.clone()
    }
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    fn events(&self) -> Vec<String> {
        self.events.lock().expect("events lock").clone()
    }

    fn push(&self, event: String) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl SessionReporter for RecordingReporter {
    fn command_started(&self, spec: &CommandSpec) {
        self.push(format!("started:{}", spec.executable()));
    }

    fn command_finished(&self, _spec: &CommandSpec, outcome: &Outcome, _elapsed: Duration) {
        self.push(format!("finished:{}", outcome.kind()));
    }

    fn session_failed(&self, error: &SessionError) {
        self.push(format!("failed:{}", error.stage()));
    }
}

/// In-memory duplex stream.
struct MemoryStream {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
    fail_writes: bool,
}

impl MemoryStream {
    fn new(input: &str) -> Self {
        Self {
            input: Cursor::new(input.as_bytes().to_vec()),
            output: Vec::new(),
            fail_writes: false,
        }
    }

    fn failing_writes(input: &str) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(input)
        }
    }

    fn written(&self) -> &str {
        std::str::from_utf8(&self.output).expect("utf-8 output")
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn session(outcome: Outcome) -> Session<StubExecutor, RecordingReporter> {
    Session::with_reporter(StubExecutor::new(outcome), RecordingReporter::default())
}

#[test]
fn completed_command_is_written_as_one_line() {
    let session = session(Outcome::Completed {
        stdout: String::from("hello\n"),
    });
    let mut stream = MemoryStream::new(r#"{"executable":"echo","arguments":["hello"]}"#);

    let result = session.run(&mut stream).expect("session succeeds");

    assert_eq!(result.exit_code, 0);
    assert_eq!(stream.written(), "{\"exit_code\":0,\"output\":\"hello\\n\"}\n");
    assert_eq!(session.executor.calls(), 1);
    assert_eq!(
        session.reporter.events(),
        vec!["started:echo", "finished:completed"]
    );
}

#[test]
fn executor_receives_the_decoded_specification() {
    let session = session(Outcome::Completed {
        stdout: String::new(),
    });
    let mut stream =
        MemoryStream::new(r#"{"executable":"cat","stdin":"ping","timeout":250}"#);

    session.run(&mut stream).expect("session succeeds");

    let seen = session.executor.seen.lock().expect("seen lock");
    assert_eq!(
        seen.as_slice(),
        [CommandSpec::new("cat")
            .with_stdin("ping")
            .with_timeout(Timeout::from_millis(250))]
    );
}

#[test]
fn failed_exit_reports_code_and_stderr() {
    let session = session(Outcome::FailedExit {
        code: 3,
        stderr: String::from("boom"),
    });
    let mut stream = MemoryStream::new(r#"{"executable":"sh"}"#);

    let result = session.run(&mut stream).expect("session succeeds");

    assert_eq!(
        result,
        CommandResult {
            exit_code: 3,
            output: String::from("boom"),
        }
    );
}

#[test]
fn execution_fault_still_produces_a_result() {
    let session = session(Outcome::from(ExecutionFault::DeadlineExceeded {
        timeout: Timeout::from_millis(100),
    }));
    let mut stream = MemoryStream::new(r#"{"executable":"sleep","timeout":100}"#);

    let result = session.run(&mut stream).expect("session succeeds");

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.output, "command timed out after 100ms");
    assert!(stream.written().ends_with('\n'));
}

#[rstest]
#[case::empty("")]
#[case::malformed("{not json")]
#[case::missing_executable(r#"{"arguments":["x"]}"#)]
#[case::wrong_type(r#"{"executable":42}"#)]
fn undecodable_request_aborts_without_output(#[case] input: &str) {
    let session = session(Outcome::Completed {
        stdout: String::new(),
    });
    let mut stream = MemoryStream::new(input);

    let error = session.run(&mut stream).expect_err("decode must fail");

    assert!(matches!(error, SessionError::Decode { .. }));
    assert_eq!(error.stage(), "decoding");
    assert!(stream.written().is_empty());
    assert_eq!(session.executor.calls(), 0);
    assert_eq!(session.reporter.events(), vec!["failed:decoding"]);
}

#[test]
fn write_failure_aborts_after_execution() {
    let session = session(Outcome::Completed {
        stdout: String::from("hello\n"),
    });
    let mut stream = MemoryStream::failing_writes(r#"{"executable":"echo"}"#);

    let error = session.run(&mut stream).expect_err("encode must fail");

    assert!(matches!(error, SessionError::Encode { .. }));
    assert_eq!(session.executor.calls(), 1);
    assert_eq!(
        session.reporter.events(),
        vec!["started:echo", "finished:completed", "failed:encoding"]
    );
}

#[test]
fn one_session_serves_many_streams() {
    let session = session(Outcome::Completed {
        stdout: String::from("ok"),
    });
    for _ in 0..3 {
        let mut stream = MemoryStream::new(r#"{"executable":"true"}"#);
        session.run(&mut stream).expect("session succeeds");
    }
    assert_eq!(session.executor.calls(), 3);
}

#[rstest]
#[case(SessionState::Idle, false)]
#[case(SessionState::Decoding, false)]
#[case(SessionState::Executing, false)]
#[case(SessionState::Encoding, false)]
#[case(SessionState::Done, true)]
#[case(SessionState::Aborted, true)]
fn terminal_states(#[case] state: SessionState, #[case] terminal: bool) {
    assert_eq!(state.is_terminal(), terminal);
}

#[test]
fn tracker_walks_the_full_lifecycle() {
    let mut tracker = StateTracker::default();
    for next in [
        SessionState::Decoding,
        SessionState::Executing,
        SessionState::Encoding,
        SessionState::Done,
    ] {
        tracker.advance(next);
    }
    assert_eq!(tracker.state, SessionState::Done);
}

#[cfg(debug_assertions)]
#[rstest]
#[case(SessionState::Done)]
#[case(SessionState::Aborted)]
#[should_panic(expected = "session cannot move from")]
fn tracker_rejects_leaving_a_terminal_state(#[case] terminal: SessionState) {
    let mut tracker = StateTracker { state: terminal };
    tracker.advance(SessionState::Decoding);
}
