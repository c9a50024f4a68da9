//! Duplex request/response protocol for the sysmon dashboard.
//!
//! The dashboard and the collector exchange [`Message`]s over a single TCP
//! connection, one per length-prefixed frame ([`codec`]). Either side runs a
//! [`Connection`] loop that writes queued messages and hands decoded ones to
//! an [`InboundHandler`]:
//!
//! - the dashboard installs a [`PendingRequestTable`] and issues requests
//!   through a [`RequestDispatcher`], which pairs each response with its
//!   caller by correlation id;
//! - the collector installs a [`RequestRouter`], which runs topic handlers on
//!   a bounded [`WorkerPool`] and answers with a response per request.
//!
//! Requests may be issued concurrently and responses may arrive in any order.
//! Every request completes exactly once: with its value, a remote error, a
//! timeout, or [`RequestError::ConnectionClosed`] when the connection ends.

mod client;
pub mod codec;
mod connection;
mod dispatcher;
mod errors;
mod message;
mod pending;
mod pool;
mod router;

#[cfg(test)]
mod test_support;

pub use client::{CONNECT_TIMEOUT, Client};
pub use codec::{FrameCodec, FrameDecodeError, FrameDecoder, FrameEncodeError};
pub use connection::{
    CloseReason, Connection, ConnectionSettings, ConnectionState, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_POLL_INTERVAL, InboundHandler, Outbound, QueueClosed,
};
pub use dispatcher::RequestDispatcher;
pub use errors::{ConnectionError, HandlerError, RequestError};
pub use message::{CorrelationId, ErrorDescriptor, Message, MessageBody, Outcome, RemoteErrorKind};
pub use pending::{PendingRequest, PendingRequestTable};
pub use pool::{PoolError, WorkerPool};
pub use router::{RequestRouter, TopicHandler};
