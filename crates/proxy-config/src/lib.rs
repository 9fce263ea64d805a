//! Shared configuration for the command proxy.
//!
//! Configuration is layered by `ortho_config`: command-line flags override
//! `PROXY_*` environment variables, which override an optional TOML file
//! (selected with `--config-path`), which override the built-in defaults.
//! The only setting that changes behaviour is `address`: when present the
//! proxy serves connections on that endpoint, otherwise it runs a single
//! exchange over standard input and output.

mod defaults;
mod endpoint;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_LISTEN_HOST, DEFAULT_LOG_FILTER, default_log_filter, default_log_format,
};
pub use self::endpoint::{EndpointPreparationError, ListenEndpoint, ListenEndpointParseError};
pub use self::logging::{LogFormat, LogFormatParseError};

/// Resolved proxy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "PROXY")]
pub struct Config {
    /// Listen address (`host:port`, `tcp://host:port` or `unix:///path`).
    /// Absent or blank selects one-shot mode.
    pub address: Option<String>,
    /// Tracing filter expression, e.g. `info` or `command_proxy=debug`.
    pub log_filter: Option<String>,
    /// Log output format.
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Returns the listen endpoint when an address is configured.
    ///
    /// A blank address counts as absent so that `PROXY_ADDRESS=` keeps the
    /// proxy in one-shot mode.
    ///
    /// # Errors
    ///
    /// Returns [`ListenEndpointParseError`] when the address is malformed.
    pub fn listen_endpoint(&self) -> Result<Option<ListenEndpoint>, ListenEndpointParseError> {
        match self.address.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(address) => address.parse().map(Some),
        }
    }

    /// Effective log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Effective log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }
}
