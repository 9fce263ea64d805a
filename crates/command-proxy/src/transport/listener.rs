//! Socket listener that hands each accepted connection to its own thread.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use proxy_config::ListenEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use camino::Utf8Path;
#[cfg(unix)]
use std::os::unix::net::UnixListener;

/// Sleep between polls of an idle non-blocking socket.
const IDLE_BACKOFF: Duration = Duration::from_millis(25);
/// Sleep after an accept error so a persistent fault does not spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Listener bound to a [`ListenEndpoint`].
#[derive(Debug)]
pub struct SocketListener {
    endpoint: ListenEndpoint,
    socket: BoundSocket,
}

#[derive(Debug)]
enum BoundSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl BoundSocket {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Accepts one pending connection, or `None` when nothing is waiting.
    /// Accepted streams are switched back to blocking mode for the session.
    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl SocketListener {
    /// Binds `endpoint`. A Unix socket file left behind by a previous run is
    /// replaced; one that still accepts connections is not.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the address cannot be resolved or bound,
    /// or when a Unix socket path is occupied.
    pub fn bind(endpoint: &ListenEndpoint) -> Result<Self, ListenerError> {
        let socket = match endpoint {
            ListenEndpoint::Tcp { host, port } => BoundSocket::Tcp(bind_tcp(host, *port)?),
            #[cfg(unix)]
            ListenEndpoint::Unix { path } => BoundSocket::Unix(bind_unix(path)?),
            #[cfg(not(unix))]
            ListenEndpoint::Unix { .. } => {
                return Err(ListenerError::UnsupportedUnix {
                    endpoint: endpoint.to_string(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Endpoint this listener was bound from.
    #[must_use]
    pub const fn endpoint(&self) -> &ListenEndpoint {
        &self.endpoint
    }

    /// Bound TCP address, which reveals the port chosen for port zero.
    /// Unix listeners have none.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            BoundSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            BoundSocket::Unix(_) => None,
        }
    }

    /// Starts the accept loop on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] when the socket cannot be put
    /// into non-blocking mode.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.socket.set_nonblocking() {
            remove_socket_file(&self.endpoint);
            return Err(ListenerError::NonBlocking { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener: self,
            shutdown: Arc::clone(&shutdown),
            handler,
            next_session: AtomicU64::new(1),
        };
        let handle = thread::Builder::new()
            .name(String::from("proxy-accept"))
            .spawn(move || accept_loop.run())
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept loop.
///
/// Dropping the handle requests shutdown without waiting for it.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop. Sessions already running are left to
    /// finish on their own threads.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the loop panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        self.handle
            .take()
            .map_or(Ok(()), |handle| {
                handle.join().map_err(|_| ListenerError::ThreadPanic)
            })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct AcceptLoop {
    listener: SocketListener,
    shutdown: Arc<AtomicBool>,
    handler: Arc<dyn ConnectionHandler>,
    next_session: AtomicU64,
}

impl AcceptLoop {
    fn run(self) {
        let endpoint = &self.listener.endpoint;
        info!(target: LISTENER_TARGET, %endpoint, "socket listener active");

        // Only the first of a run of identical accept errors is logged.
        let mut last_error = None::<io::ErrorKind>;
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.socket.accept() {
                Ok(Some(stream)) => {
                    last_error = None;
                    self.dispatch(stream);
                }
                Ok(None) => thread::sleep(IDLE_BACKOFF),
                Err(error) => {
                    if last_error != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, %error, "socket accept error");
                    }
                    last_error = Some(error.kind());
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        info!(target: LISTENER_TARGET, %endpoint, "socket listener stopped");
        remove_socket_file(endpoint);
    }

    fn dispatch(&self, stream: ConnectionStream) {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(target: LISTENER_TARGET, session, "accepted connection");
        let handler = Arc::clone(&self.handler);
        let spawned = thread::Builder::new()
            .name(format!("proxy-session-{session}"))
            .spawn(move || handler.handle(stream));
        if let Err(error) = spawned {
            // The stream moved into the failed closure and is dropped, which
            // closes the connection.
            warn!(
                target: LISTENER_TARGET,
                session,
                %error,
                "failed to spawn session thread"
            );
        }
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Utf8Path) -> Result<UnixListener, ListenerError> {
    reclaim_stale_socket(path)?;
    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes a socket file nobody is listening on. Anything else at the path
/// is left alone and reported.
#[cfg(unix)]
fn reclaim_stale_socket(path: &Utf8Path) -> Result<(), ListenerError> {
    use std::fs;
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixStream;

    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ListenerError::UnixMetadata {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::UnixNotSocket {
            path: path.to_path_buf(),
        });
    }

    match UnixStream::connect(path) {
        Ok(_live) => Err(ListenerError::UnixInUse {
            path: path.to_path_buf(),
        }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(target: LISTENER_TARGET, %path, "removing stale unix socket");
            fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(ListenerError::UnixConnect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn remove_socket_file(endpoint: &ListenEndpoint) {
    let Some(path) = endpoint.unix_path() else {
        return;
    };
    if let Err(error) = std::fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            %error,
            %path,
            "failed to remove unix socket file"
        );
    }
}

#[cfg(not(unix))]
fn remove_socket_file(_endpoint: &ListenEndpoint) {}
