//! Observable lifecycle of a connection.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::CONNECTION_TARGET;

/// Lifecycle states of a connection.
///
/// States only move forward: `Disconnected → Connecting → Open → Closing →
/// Closed`. A failed connect attempt leaves the state at `Connecting` and the
/// connection is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// No socket has been opened.
    Disconnected,
    /// A connect attempt or accept hand-off is in progress.
    Connecting,
    /// The loop is running and frames flow both ways.
    Open,
    /// Teardown has started; pending requests are being failed.
    Closing,
    /// The socket is released and the loop has exited.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        formatter.write_str(label)
    }
}

/// Why a connection stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The local side asked the loop to stop.
    Requested,
    /// The peer closed its end of the stream.
    PeerClosed,
    /// An inbound frame could not be decoded.
    Decode(String),
    /// Reading or writing the socket failed.
    Io(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => formatter.write_str("closed locally"),
            Self::PeerClosed => formatter.write_str("peer closed the connection"),
            Self::Decode(detail) => write!(formatter, "protocol error: {detail}"),
            Self::Io(detail) => write!(formatter, "i/o error: {detail}"),
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    state: ConnectionState,
    reason: Option<CloseReason>,
}

/// Shared, waitable holder of a connection's state.
#[derive(Debug)]
pub(crate) struct StateCell {
    inner: Mutex<Snapshot>,
    changed: Condvar,
}

impl StateCell {
    pub(crate) const fn new(state: ConnectionState) -> Self {
        Self {
            inner: Mutex::new(Snapshot {
                state,
                reason: None,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self) -> ConnectionState {
        self.lock().state
    }

    pub(crate) fn reason(&self) -> Option<CloseReason> {
        self.lock().reason.clone()
    }

    /// Moves forward to `next`; backward moves are ignored.
    pub(crate) fn advance(&self, next: ConnectionState) {
        let mut snapshot = self.lock();
        if next <= snapshot.state {
            return;
        }
        debug!(
            target: CONNECTION_TARGET,
            from = %snapshot.state,
            to = %next,
            "connection state changed"
        );
        snapshot.state = next;
        drop(snapshot);
        self.changed.notify_all();
    }

    pub(crate) fn begin_closing(&self, reason: CloseReason) {
        self.lock().reason.get_or_insert(reason);
        self.advance(ConnectionState::Closing);
    }

    /// Blocks until the state reaches `Closed` or `timeout` elapses.
    pub(crate) fn wait_closed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut snapshot = self.lock();
        while snapshot.state != ConnectionState::Closed {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            snapshot = self
                .changed
                .wait_timeout(snapshot, remaining)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }
}
