//! Error types for socket listener operations.

use std::io;
use std::net::SocketAddr;

#[cfg(unix)]
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Host name resolution failed.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Host from the endpoint.
        host: String,
        /// Port from the endpoint.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded without yielding an address.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Host from the endpoint.
        host: String,
        /// Port from the endpoint.
        port: u16,
    },
    /// The TCP address could not be bound, usually because it is taken.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Resolved address.
        addr: SocketAddr,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// The bound socket rejected non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be started.
    #[error("failed to spawn listener thread: {source}")]
    Spawn {
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Unix endpoints were requested on a platform without them.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix {
        /// Rendered endpoint.
        endpoint: String,
    },
    /// The Unix socket could not be bound.
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: Utf8PathBuf,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Another proxy still accepts connections on the socket.
    #[cfg(unix)]
    #[error("unix socket {path} is already served by another process")]
    UnixInUse {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// Something other than a socket occupies the path.
    #[cfg(unix)]
    #[error("{path} exists and is not a unix socket")]
    UnixNotSocket {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// The existing path could not be inspected.
    #[cfg(unix)]
    #[error("failed to inspect unix socket {path}: {source}")]
    UnixMetadata {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Probing the existing socket failed for a reason other than refusal.
    #[cfg(unix)]
    #[error("failed to probe existing unix socket {path}: {source}")]
    UnixConnect {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be deleted.
    #[cfg(unix)]
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The accept loop panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
