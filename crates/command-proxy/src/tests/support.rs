//! Shared helpers for the behavioural suites.

use std::io::{BufRead, BufReader, Read, Write};
use std::sync::{Arc, Condvar, Mutex};

use serde_json::Value;

use crate::command::CommandResult;
use crate::process::{ShutdownError, ShutdownSignal};

/// Writes `request` and reads back the single result line.
///
/// The write half stays open, matching clients that keep the connection
/// around until the response arrives.
pub(crate) fn exchange<S>(stream: &mut S, request: &Value) -> Result<CommandResult, String>
where
    S: Read + Write,
{
    let body = serde_json::to_vec(request).map_err(|error| error.to_string())?;
    stream
        .write_all(&body)
        .and_then(|()| stream.flush())
        .map_err(|error| format!("write request: {error}"))?;

    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|error| format!("read result: {error}"))?;
    if line.is_empty() {
        return Err(String::from("connection closed without a result"));
    }
    serde_json::from_str(&line).map_err(|error| format!("parse result {line:?}: {error}"))
}

/// Request running `script` through `sh -c`.
pub(crate) fn shell_request(script: &str, timeout: Option<i64>) -> Value {
    let mut request = serde_json::json!({
        "executable": "sh",
        "arguments": ["-c", script],
    });
    if let (Some(timeout), Some(object)) = (timeout, request.as_object_mut()) {
        object.insert(String::from("timeout"), Value::from(timeout));
    }
    request
}

/// Shutdown signal released explicitly by the test.
#[derive(Clone)]
pub(crate) struct TestShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub(crate) fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        *triggered = true;
        cvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        while !*triggered {
            triggered = cvar
                .wait(triggered)
                .expect("shutdown mutex poisoned during wait");
        }
        Ok(())
    }
}
