//! Launch sequencing for one-shot and listener modes.

use std::sync::Arc;

use ortho_config::OrthoConfig;
use tracing::info;

use proxy_config::{Config, ListenEndpoint};

use crate::command::ProcessExecutor;
use crate::session::Session;
use crate::telemetry;
use crate::transport::{SocketListener, StdioStream};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// How the proxy serves requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// One exchange over standard input and output, then exit.
    OneShot,
    /// Accept connections on the endpoint until a shutdown signal arrives.
    Listen(ListenEndpoint),
}

impl LaunchMode {
    /// Selects the mode from the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Address`] when the address cannot be parsed.
    pub fn from_config(config: &Config) -> Result<Self, LaunchError> {
        Ok(config
            .listen_endpoint()?
            .map_or(Self::OneShot, Self::Listen))
    }
}

/// Loads configuration, installs telemetry and runs the selected mode with
/// the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when any launch step fails, or when the one-shot
/// exchange could not decode its request or write its result.
pub fn run() -> Result<(), LaunchError> {
    let config = Config::load()?;
    let telemetry = telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        format = %telemetry.format(),
        "telemetry initialised"
    );
    run_with_config(&config, &SystemShutdownSignal::new())
}

/// Runs the mode selected by `config`, waiting on `shutdown` in listener
/// mode. Telemetry is left to the caller.
///
/// # Errors
///
/// Returns [`LaunchError`] when the address is invalid, the listener cannot
/// start, waiting for shutdown fails, or the one-shot session aborts.
pub fn run_with_config<S>(config: &Config, shutdown: &S) -> Result<(), LaunchError>
where
    S: ShutdownSignal + ?Sized,
{
    let mode = LaunchMode::from_config(config)?;
    info!(
        target: PROCESS_TARGET,
        ?mode,
        "starting command proxy"
    );
    match mode {
        LaunchMode::OneShot => run_one_shot(),
        LaunchMode::Listen(endpoint) => serve(&endpoint, shutdown),
    }
}

fn run_one_shot() -> Result<(), LaunchError> {
    let session = Session::new(ProcessExecutor::new());
    let mut stream = StdioStream::stdio();
    session.run(&mut stream)?;
    Ok(())
}

fn serve<S>(endpoint: &ListenEndpoint, shutdown: &S) -> Result<(), LaunchError>
where
    S: ShutdownSignal + ?Sized,
{
    endpoint.prepare_filesystem()?;
    let listener = SocketListener::bind(endpoint)?;
    if let Some(addr) = listener.local_addr() {
        info!(
            target: PROCESS_TARGET,
            %addr,
            "listening for command requests"
        );
    }

    let handler = Arc::new(Session::new(ProcessExecutor::new()));
    let handle = listener.start(handler)?;
    let waited = shutdown.wait();
    handle.shutdown();
    handle.join()?;
    waited?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn config_with(address: Option<&str>) -> Config {
        Config {
            address: address.map(str::to_owned),
            ..Config::default()
        }
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    fn missing_address_selects_one_shot(#[case] address: Option<&str>) {
        let mode = LaunchMode::from_config(&config_with(address)).expect("mode");
        assert_eq!(mode, LaunchMode::OneShot);
    }

    #[rstest]
    #[case("127.0.0.1:7000", ListenEndpoint::tcp("127.0.0.1", 7000))]
    #[case(":7000", ListenEndpoint::tcp("0.0.0.0", 7000))]
    #[case("unix:///tmp/proxy.sock", ListenEndpoint::unix("/tmp/proxy.sock"))]
    fn address_selects_listen(#[case] address: &str, #[case] expected: ListenEndpoint) {
        let mode = LaunchMode::from_config(&config_with(Some(address))).expect("mode");
        assert_eq!(mode, LaunchMode::Listen(expected));
    }

    #[test]
    fn invalid_address_is_a_launch_error() {
        let error = LaunchMode::from_config(&config_with(Some("not an address")))
            .expect_err("address must fail");
        assert!(matches!(error, LaunchError::Address { .. }));
    }
}
