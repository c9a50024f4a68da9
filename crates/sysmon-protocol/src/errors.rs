//! Error taxonomy shared by both ends of a connection.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::message::CorrelationId;

/// Failures delivered to the caller of a single request.
///
/// The type is `Clone` because a connection failure is fanned out to every
/// pending request at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The connection closed before a response arrived.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Why the connection ended.
        reason: String,
    },
    /// No response arrived within the caller's bound.
    #[error("request for '{topic}' timed out after {}ms", after.as_millis())]
    Timeout {
        /// Requested topic.
        topic: String,
        /// Bound that elapsed.
        after: Duration,
    },
    /// The server has no handler for the topic.
    #[error("unknown topic '{topic}'")]
    UnknownTopic {
        /// Requested topic.
        topic: String,
    },
    /// The server's handler failed.
    #[error("handler for '{topic}' failed: {message}")]
    Handler {
        /// Requested topic.
        topic: String,
        /// Failure reported by the handler.
        message: String,
    },
    /// The server had no worker capacity for the request.
    #[error("server too busy to serve '{topic}'")]
    Busy {
        /// Requested topic.
        topic: String,
    },
    /// The request frame could not be produced.
    #[error("request for '{topic}' could not be sent: {reason}")]
    Undeliverable {
        /// Requested topic.
        topic: String,
        /// Encoding failure.
        reason: String,
    },
    /// A request with the same correlation id is already outstanding.
    #[error("correlation id {id} is already pending")]
    DuplicateCorrelation {
        /// Offending identifier.
        id: CorrelationId,
    },
    /// The thread that waits for the response could not be started.
    #[error("failed to start request waiter: {reason}")]
    Spawn {
        /// Operating system error text.
        reason: String,
    },
}

impl RequestError {
    pub(crate) fn connection_closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_topic(topic: &str) -> Self {
        Self::UnknownTopic {
            topic: topic.to_owned(),
        }
    }

    pub(crate) fn handler(topic: &str, message: impl Into<String>) -> Self {
        Self::Handler {
            topic: topic.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn busy(topic: &str) -> Self {
        Self::Busy {
            topic: topic.to_owned(),
        }
    }
}

/// Failure reported by a topic handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error with the given detail.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Captures the display text of another error.
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(error.to_string())
    }

    /// Detail forwarded to the requester.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for HandlerError {
    fn from(error: io::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// Failures establishing or tearing down a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connecting to the peer failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Target address.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Preparing the socket for the connection loop failed.
    #[error("failed to configure socket: {0}")]
    Configure(#[source] io::Error),
    /// The connection loop thread could not be started.
    #[error("failed to spawn connection loop: {0}")]
    Spawn(#[source] io::Error),
    /// The connection loop thread panicked.
    #[error("connection loop panicked")]
    LoopPanicked,
}
