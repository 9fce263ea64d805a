use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::defaults::DEFAULT_LISTEN_HOST;

/// Address the proxy listens on when running in listener mode.
///
/// Parsed from `host:port` (plain TCP), `tcp://host:port`, or
/// `unix:///path/to/socket`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ListenEndpoint {
    /// Unix domain socket endpoint.
    Unix {
        /// Filesystem path of the socket.
        path: Utf8PathBuf,
    },
    /// TCP socket endpoint.
    Tcp {
        /// Host name or IP literal to bind.
        host: String,
        /// Port to bind; zero selects an ephemeral port.
        port: u16,
    },
}

impl ListenEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP socket endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Returns the Unix socket path when the endpoint uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }

    /// Ensures a Unix socket's parent directory exists with restrictive
    /// permissions. TCP endpoints need no preparation.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointPreparationError`] when the socket path has no parent
    /// or the directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), EndpointPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent() else {
            return Err(EndpointPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };
        if parent.as_str().is_empty() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(EndpointPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for ListenEndpoint {
    type Err = ListenEndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ListenEndpointParseError::Empty);
        }
        if trimmed.contains("://") {
            parse_url(trimmed)
        } else {
            parse_host_port(trimmed)
        }
    }
}

fn parse_url(input: &str) -> Result<ListenEndpoint, ListenEndpointParseError> {
    let url = Url::parse(input)?;
    match url.scheme() {
        "unix" => {
            let path = url.path();
            if path.is_empty() {
                return Err(ListenEndpointParseError::MissingUnixPath(input.to_owned()));
            }
            Ok(ListenEndpoint::unix(path))
        }
        "tcp" => {
            let host = url
                .host_str()
                .ok_or_else(|| ListenEndpointParseError::MissingHost(input.to_owned()))?;
            let port = url
                .port()
                .ok_or_else(|| ListenEndpointParseError::MissingPort(input.to_owned()))?;
            Ok(ListenEndpoint::tcp(strip_brackets(host), port))
        }
        other => Err(ListenEndpointParseError::UnsupportedScheme(other.to_owned())),
    }
}

/// Parses the `host:port` form, where an empty host binds every interface.
fn parse_host_port(input: &str) -> Result<ListenEndpoint, ListenEndpointParseError> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| ListenEndpointParseError::MissingPort(input.to_owned()))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| ListenEndpointParseError::InvalidPort(input.to_owned()))?;
    let host = strip_brackets(host);
    if host.is_empty() {
        Ok(ListenEndpoint::tcp(DEFAULT_LISTEN_HOST, port))
    } else {
        Ok(ListenEndpoint::tcp(host, port))
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host)
}

/// Errors encountered while parsing a [`ListenEndpoint`] from text.
#[derive(Debug, Error)]
pub enum ListenEndpointParseError {
    /// The address was blank.
    #[error("listen address is empty")]
    Empty,
    /// Scheme was not recognised.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// TCP host name was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// TCP port was missing from the address.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// TCP port was not a valid port number.
    #[error("invalid TCP port in '{0}'")]
    InvalidPort(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum EndpointPreparationError {
    /// Parent directory is missing when creating a Unix socket path.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Configured socket path.
        path: Utf8PathBuf,
    },
    /// Failed to create or adjust socket directories.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
