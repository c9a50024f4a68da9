//! TCP listener that hands over the dashboard's single connection.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use sysmon_config::ServerEndpoint;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::listener");
const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Errors raised while binding or accepting.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The endpoint did not resolve to a socket address.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Configured endpoint.
        endpoint: ServerEndpoint,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Binding the socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Resolved address.
        addr: SocketAddr,
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to configure listener: {source}")]
    NonBlocking {
        /// Socket error.
        #[source]
        source: io::Error,
    },
}

/// Bound listener.
#[derive(Debug)]
pub struct ServerListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl ServerListener {
    /// Resolves `endpoint` and binds a non-blocking listener to it.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when resolution, binding, or configuration
    /// fails.
    pub fn bind(endpoint: &ServerEndpoint) -> Result<Self, ListenerError> {
        let resolved = endpoint.resolve().map_err(|source| ListenerError::Resolve {
            endpoint: endpoint.clone(),
            source,
        })?;
        let listener = TcpListener::bind(resolved).map_err(|source| ListenerError::Bind {
            addr: resolved,
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let addr = listener.local_addr().unwrap_or(resolved);
        Ok(Self { listener, addr })
    }

    /// Bound address, including the kernel-assigned port when `0` was
    /// requested.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for one inbound connection.
    ///
    /// Returns `None` once `shutdown` is raised. Transient accept errors are
    /// logged once per kind and retried after a back-off.
    #[must_use]
    pub fn accept_one(&self, shutdown: &AtomicBool) -> Option<TcpStream> {
        info!(target: LISTENER_TARGET, addr = %self.addr, "listener active");
        let mut last_error = None::<io::ErrorKind>;
        while !shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!(target: LISTENER_TARGET, %peer, "accepted connection");
                    return Some(stream);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(target: LISTENER_TARGET, %error, "socket accept error");
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        info!(target: LISTENER_TARGET, "listener stopped before a connection arrived");
        None
    }
}
