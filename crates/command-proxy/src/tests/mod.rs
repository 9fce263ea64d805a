//! Behavioural test suites for the command proxy.

#[cfg(unix)]
mod support;
