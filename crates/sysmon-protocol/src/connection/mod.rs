//! Connection loop shared by the client and the server.
//!
//! A [`Connection`] owns one TCP stream and a background thread that
//! multiplexes it: queued outbound messages are framed and written, inbound
//! bytes are reassembled into messages and handed to an [`InboundHandler`].
//! When the loop stops for any reason the handler is told exactly once via
//! [`InboundHandler::connection_closed`] before the socket is released.

mod driver;
mod state;

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{FrameCodec, FrameEncodeError};
use crate::errors::ConnectionError;
use crate::message::Message;

pub use state::{CloseReason, ConnectionState};
pub(crate) use state::StateCell;

pub(crate) const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::connection");

/// Default idle wait between loop iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Default largest frame payload.
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Tuning shared by every connection loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// How long an idle loop waits for outbound work before polling the
    /// socket again.
    pub poll_interval: Duration,
    /// Largest frame payload accepted or produced.
    pub max_frame_bytes: u32,
    /// Per-request wait bound applied by dispatchers; `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            request_timeout: None,
        }
    }
}

impl ConnectionSettings {
    pub(crate) const fn codec(&self) -> FrameCodec {
        FrameCodec::new(self.max_frame_bytes)
    }
}

/// Receives everything the connection loop decodes.
///
/// Callbacks run on the loop thread and must not block; long work belongs on
/// another thread that answers through the supplied [`Outbound`].
pub trait InboundHandler: Send + Sync + 'static {
    /// Handles one decoded message.
    fn on_message(&self, message: Message, outbound: &Outbound);

    /// Called when a queued message could not be framed and was dropped.
    fn on_undeliverable(&self, _message: &Message, _error: &FrameEncodeError) {}

    /// Called once when the loop stops, before the socket is released.
    fn connection_closed(&self, _reason: &CloseReason) {}
}

/// Returned when a message is queued on a connection that has stopped.
#[derive(Debug, Error)]
#[error("connection is no longer accepting messages")]
pub struct QueueClosed(pub Message);

/// Cloneable handle for queueing messages on a connection.
///
/// Any thread may send; the loop thread is the only writer to the socket.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: Sender<Message>,
}

impl Outbound {
    /// Queues `message` for transmission.
    ///
    /// # Errors
    ///
    /// Returns the message inside [`QueueClosed`] once the loop has exited.
    pub fn send(&self, message: Message) -> Result<(), QueueClosed> {
        self.sender
            .send(message)
            .map_err(|error| QueueClosed(error.0))
    }
}

/// A running connection loop.
///
/// Dropping the handle stops the loop and waits for it to exit.
#[derive(Debug)]
pub struct Connection {
    peer: SocketAddr,
    state: Arc<StateCell>,
    outbound: Outbound,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Connection {
    /// Starts a loop over an already connected stream.
    ///
    /// # Errors
    ///
    /// Fails when the socket cannot be switched to non-blocking mode or the
    /// loop thread cannot be spawned.
    pub fn spawn(
        stream: TcpStream,
        handler: Arc<dyn InboundHandler>,
        settings: &ConnectionSettings,
    ) -> Result<Self, ConnectionError> {
        Self::start(
            stream,
            handler,
            settings,
            Arc::new(StateCell::new(ConnectionState::Connecting)),
        )
    }

    pub(crate) fn start(
        stream: TcpStream,
        handler: Arc<dyn InboundHandler>,
        settings: &ConnectionSettings,
        state: Arc<StateCell>,
    ) -> Result<Self, ConnectionError> {
        let peer = stream.peer_addr().map_err(ConnectionError::Configure)?;
        stream
            .set_nonblocking(true)
            .map_err(ConnectionError::Configure)?;
        stream.set_nodelay(true).map_err(ConnectionError::Configure)?;

        let (sender, queue) = mpsc::channel();
        let outbound = Outbound { sender };
        let stop = Arc::new(AtomicBool::new(false));
        let driver = driver::Driver::new(
            stream,
            queue,
            outbound.clone(),
            handler,
            Arc::clone(&stop),
            settings,
        );

        state.advance(ConnectionState::Open);
        let loop_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name(format!("sysmon-conn-{peer}"))
            .spawn(move || driver.run(&loop_state))
            .map_err(|error| {
                state.advance(ConnectionState::Closed);
                ConnectionError::Spawn(error)
            })?;
        info!(target: CONNECTION_TARGET, %peer, "connection open");

        Ok(Self {
            peer,
            state,
            outbound,
            stop,
            worker: Some(worker),
        })
    }

    /// Address of the remote end.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Why the loop stopped, once it has.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.state.reason()
    }

    /// Handle for queueing messages on this connection.
    #[must_use]
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Blocks until the loop has fully stopped or `timeout` elapses.
    ///
    /// Returns `true` when the connection is closed.
    #[must_use]
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        self.state.wait_closed(timeout)
    }

    /// Asks the loop to stop without waiting for it.
    pub fn request_close(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stops the loop and waits for it to release the socket.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::LoopPanicked`] when the loop thread panicked.
    pub fn close(mut self) -> Result<CloseReason, ConnectionError> {
        self.stop_and_join()?;
        Ok(self.close_reason().unwrap_or(CloseReason::Requested))
    }

    fn stop_and_join(&mut self) -> Result<(), ConnectionError> {
        self.request_close();
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        debug!(target: CONNECTION_TARGET, peer = %self.peer, "joining connection loop");
        worker.join().map_err(|_| ConnectionError::LoopPanicked)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.stop_and_join().is_err() {
            warn!(target: CONNECTION_TARGET, peer = %self.peer, "connection loop panicked");
        }
    }
}
