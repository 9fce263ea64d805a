//! Byte-stream transports for sessions.
//!
//! In listener mode the proxy binds a socket endpoint and accepts connections
//! on a background thread, handing each one to a [`ConnectionHandler`] on its
//! own thread. In one-shot mode the process's standard streams are joined
//! into a single [`DuplexStream`].

mod errors;
mod handler;
mod listener;
mod stdio;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::stdio::{DuplexStream, StdioStream};

pub(crate) const LISTENER_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::transport");
