//! Tests for the process executor. These spawn real Unix utilities.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use rstest::{fixture, rstest};

use super::deadline::Deadline;
use super::errors::ExecutionFault;
use super::executor::{CommandExecutor, ProcessExecutor};
use super::outcome::Outcome;
use super::spec::{CommandSpec, Timeout};

#[fixture]
fn executor() -> ProcessExecutor {
    ProcessExecutor::new()
}

fn run(executor: &ProcessExecutor, spec: &CommandSpec) -> Outcome {
    executor.execute(spec, &Deadline::start(spec.timeout()))
}

fn shell(script: &str) -> CommandSpec {
    CommandSpec::new("sh").with_arguments(["-c", script])
}

/// Orphaned descendants may linger as zombies where nothing reaps them, so a
/// zombie counts as dead.
fn process_alive(pid: i32) -> bool {
    if let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat"))
        && let Some(state) = stat
            .rsplit(')')
            .next()
            .and_then(|fields| fields.split_whitespace().next())
    {
        return state != "Z";
    }
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

#[rstest]
fn echo_completes_with_stdout(executor: ProcessExecutor) {
    let outcome = run(&executor, &CommandSpec::new("echo").with_arguments(["hello"]));
    match outcome {
        Outcome::Completed { stdout } => assert_eq!(stdout, "hello\n"),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[rstest]
fn non_zero_exit_reports_stderr(executor: ProcessExecutor) {
    let outcome = run(&executor, &shell("printf out; printf boom >&2; exit 3"));
    match outcome {
        Outcome::FailedExit { code, stderr } => {
            assert_eq!(code, 3);
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected failed exit, got {other:?}"),
    }
}

#[rstest]
#[case("/definitely/not/a/real/path")]
#[case("")]
fn start_failure_is_an_execution_error(executor: ProcessExecutor, #[case] executable: &str) {
    let outcome = run(&executor, &CommandSpec::new(executable));
    assert_eq!(outcome.exit_code(), 1);
    match outcome {
        Outcome::ExecutionError {
            fault: ExecutionFault::StartFailed { .. },
        } => {}
        other => panic!("expected start failure, got {other:?}"),
    }
}

#[rstest]
fn stdin_payload_reaches_the_child(executor: ProcessExecutor) {
    let outcome = run(&executor, &CommandSpec::new("cat").with_stdin("ping"));
    match outcome {
        Outcome::Completed { stdout } => assert_eq!(stdout, "ping"),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[rstest]
fn absent_stdin_reads_as_empty(executor: ProcessExecutor) {
    let outcome = run(&executor, &CommandSpec::new("cat").with_stdin(""));
    match outcome {
        Outcome::Completed { stdout } => assert_eq!(stdout, ""),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[rstest]
fn ignored_stdin_is_not_an_error(executor: ProcessExecutor) {
    let payload = "x".repeat(1 << 20);
    let outcome = run(&executor, &CommandSpec::new("true").with_stdin(payload));
    assert_eq!(outcome.exit_code(), 0);
}

#[rstest]
fn large_outputs_are_captured_independently(executor: ProcessExecutor) {
    let script = "head -c 300000 /dev/zero; head -c 200000 /dev/zero >&2; exit 4";
    match run(&executor, &shell(script)) {
        Outcome::FailedExit { code, stderr } => {
            assert_eq!(code, 4);
            assert_eq!(stderr.len(), 200_000);
        }
        other => panic!("expected failed exit, got {other:?}"),
    }
}

#[rstest]
fn invalid_utf8_is_replaced(executor: ProcessExecutor) {
    match run(&executor, &shell("printf '\\377ok'")) {
        Outcome::Completed { stdout } => assert_eq!(stdout, "\u{fffd}ok"),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[rstest]
fn timeout_kills_the_process(executor: ProcessExecutor) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > '{}'; exec sleep 5", pid_file.display());
    let spec = shell(&script).with_timeout(Timeout::from_millis(100));

    let started = Instant::now();
    let outcome = run(&executor, &spec);
    let elapsed = started.elapsed();

    assert!(
        elapsed < Duration::from_secs(2),
        "timeout took {elapsed:?}"
    );
    match &outcome {
        Outcome::ExecutionError {
            fault: ExecutionFault::DeadlineExceeded { timeout },
        } => assert_eq!(*timeout, Timeout::from_millis(100)),
        other => panic!("expected deadline exceeded, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 1);

    let pid: i32 = fs::read_to_string(&pid_file)
        .expect("pid file")
        .trim()
        .parse()
        .expect("pid");
    assert!(!process_alive(pid), "child {pid} is still running");
}

#[rstest]
fn exited_command_keeps_its_result_when_a_descendant_holds_stdout(executor: ProcessExecutor) {
    let dir = tempfile::tempdir().expect("temp dir");
    let pid_file = dir.path().join("pid");
    let script = format!("sleep 5 & echo $! > '{}'; echo started", pid_file.display());
    let spec = shell(&script).with_timeout(Timeout::from_millis(200));

    let started = Instant::now();
    let outcome = run(&executor, &spec);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
    match outcome {
        Outcome::Completed { stdout } => assert_eq!(stdout, "started\n"),
        other => panic!("expected completion, got {other:?}"),
    }
    let pid: i32 = fs::read_to_string(&pid_file)
        .expect("pid file")
        .trim()
        .parse()
        .expect("pid");
    assert!(!process_alive(pid), "descendant {pid} is still running");
}

#[rstest]
fn exited_command_keeps_its_failure_when_a_descendant_holds_stderr(executor: ProcessExecutor) {
    let spec =
        shell("sleep 5 & printf boom >&2; exit 4").with_timeout(Timeout::from_millis(200));
    match run(&executor, &spec) {
        Outcome::FailedExit { code, stderr } => {
            assert_eq!(code, 4);
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected failed exit, got {other:?}"),
    }
}

#[rstest]
fn signal_termination_has_no_exit_status(executor: ProcessExecutor) {
    match run(&executor, &shell("kill -9 $$")) {
        Outcome::ExecutionError {
            fault: ExecutionFault::Terminated { status },
        } => assert!(!status.is_empty()),
        other => panic!("expected abnormal termination, got {other:?}"),
    }
}

#[rstest]
fn negative_timeout_fails_without_spawning(executor: ProcessExecutor) {
    let dir = tempfile::tempdir().expect("temp dir");
    let marker = dir.path().join("ran");
    let script = format!("touch '{}'", marker.display());
    let spec = shell(&script).with_timeout(Timeout::from_millis(-1));

    let outcome = run(&executor, &spec);

    assert!(matches!(
        outcome,
        Outcome::ExecutionError {
            fault: ExecutionFault::DeadlineExceeded { .. }
        }
    ));
    assert!(!marker.exists(), "command must not run");
}

#[rstest]
fn cancellation_stops_a_running_command(executor: ProcessExecutor) {
    let spec = CommandSpec::new("sleep")
        .with_arguments(["5"])
        .with_timeout(Timeout::from_millis(10_000));
    let deadline = Deadline::start(spec.timeout());
    let canceller = deadline.canceller();
    let cancel = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        canceller.cancel();
    });

    let started = Instant::now();
    let outcome = executor.execute(&spec, &deadline);
    cancel.join().expect("cancel thread");

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        outcome,
        Outcome::ExecutionError {
            fault: ExecutionFault::Cancelled
        }
    ));
}

#[rstest]
fn default_timeout_allows_quick_commands(executor: ProcessExecutor) {
    let spec = CommandSpec::new("sleep").with_arguments(["0.1"]);
    assert_eq!(spec.timeout(), Timeout::DEFAULT);
    assert_eq!(run(&executor, &spec).exit_code(), 0);
}
