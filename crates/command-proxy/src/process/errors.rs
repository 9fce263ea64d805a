//! Defines the error surface for launching the proxy.

use std::sync::Arc;

use thiserror::Error;

use ortho_config::OrthoError;

use proxy_config::{EndpointPreparationError, ListenEndpointParseError};

use crate::session::SessionError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors that stop the proxy process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The configured address is not a valid endpoint.
    #[error("invalid listen address: {source}")]
    Address {
        /// Underlying parse error.
        #[source]
        source: ListenEndpointParseError,
    },
    /// Installing the tracing subscriber failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Preparing the Unix socket directory failed.
    #[error("failed to prepare listen socket: {source}")]
    Prepare {
        /// Underlying filesystem error.
        #[source]
        source: EndpointPreparationError,
    },
    /// Socket listener startup failed.
    #[error("socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The one-shot exchange did not produce a result.
    #[error("one-shot session failed: {source}")]
    Session {
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<ListenEndpointParseError> for LaunchError {
    fn from(source: ListenEndpointParseError) -> Self {
        Self::Address { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<EndpointPreparationError> for LaunchError {
    fn from(source: EndpointPreparationError) -> Self {
        Self::Prepare { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<SessionError> for LaunchError {
    fn from(source: SessionError) -> Self {
        Self::Session { source }
    }
}
