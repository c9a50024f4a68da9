//! Dashboard-side connection.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::connection::{
    CONNECTION_TARGET, CloseReason, Connection, ConnectionSettings, ConnectionState,
    InboundHandler, StateCell,
};
use crate::dispatcher::RequestDispatcher;
use crate::errors::{ConnectionError, RequestError};
use crate::pending::PendingRequestTable;

/// Bound on establishing the TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An open client connection with its dispatcher.
#[derive(Debug)]
pub struct Client {
    connection: Connection,
    dispatcher: RequestDispatcher,
}

impl Client {
    /// Connects to `addr` and starts the connection loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Connect`] when the server is unreachable,
    /// or the loop start-up failure.
    pub fn connect(addr: SocketAddr, settings: &ConnectionSettings) -> Result<Self, ConnectionError> {
        let state = Arc::new(StateCell::new(ConnectionState::Disconnected));
        state.advance(ConnectionState::Connecting);
        info!(target: CONNECTION_TARGET, %addr, "connecting");
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|source| ConnectionError::Connect { addr, source })?;
        Self::start(stream, settings, state)
    }

    /// Runs the client side over an already connected stream.
    ///
    /// # Errors
    ///
    /// Returns the loop start-up failure.
    pub fn from_stream(stream: TcpStream, settings: &ConnectionSettings) -> Result<Self, ConnectionError> {
        Self::start(
            stream,
            settings,
            Arc::new(StateCell::new(ConnectionState::Connecting)),
        )
    }

    fn start(
        stream: TcpStream,
        settings: &ConnectionSettings,
        state: Arc<StateCell>,
    ) -> Result<Self, ConnectionError> {
        let table = Arc::new(PendingRequestTable::new());
        let handler: Arc<dyn InboundHandler> = Arc::clone(&table) as Arc<dyn InboundHandler>;
        let connection = Connection::start(stream, handler, settings, state)?;
        let dispatcher = RequestDispatcher::new(table, connection.outbound(), settings.request_timeout);
        Ok(Self {
            connection,
            dispatcher,
        })
    }

    /// Dispatcher bound to this connection.
    #[must_use]
    pub const fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// See [`RequestDispatcher::request`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Spawn`] when the waiter thread cannot start.
    pub fn request<F>(&self, topic: &str, on_complete: F) -> Result<JoinHandle<()>, RequestError>
    where
        F: FnOnce(Result<Value, RequestError>) + Send + 'static,
    {
        self.dispatcher.request(topic, on_complete)
    }

    /// See [`RequestDispatcher::request_blocking`].
    ///
    /// # Errors
    ///
    /// Returns any [`RequestError`] raised for the request.
    pub fn request_blocking(&self, topic: &str) -> Result<Value, RequestError> {
        self.dispatcher.request_blocking(topic)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Why the connection stopped, once it has.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.connection.close_reason()
    }

    /// Server address.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.connection.peer_addr()
    }

    /// Closes the connection; outstanding requests fail with
    /// [`RequestError::ConnectionClosed`].
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::LoopPanicked`] when the loop panicked.
    pub fn close(self) -> Result<CloseReason, ConnectionError> {
        self.connection.close()
    }
}
