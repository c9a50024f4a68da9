//! Client-side request issuing.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::connection::Outbound;
use crate::errors::RequestError;
use crate::message::Message;
use crate::pending::{PendingRequest, PendingRequestTable};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Issues requests on a connection and routes completions back to callers.
///
/// Cloning is cheap; every clone shares the same pending table and outbound
/// queue, so requests may be issued from any number of threads.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    table: Arc<PendingRequestTable>,
    outbound: Outbound,
    timeout: Option<Duration>,
}

impl RequestDispatcher {
    /// Creates a dispatcher over an existing table and outbound queue.
    #[must_use]
    pub const fn new(
        table: Arc<PendingRequestTable>,
        outbound: Outbound,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            table,
            outbound,
            timeout,
        }
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.table.len()
    }

    /// Requests `topic` and invokes `on_complete` exactly once with the
    /// result, on a dedicated waiter thread.
    ///
    /// Failures to issue the request, such as a closed connection, are also
    /// delivered through `on_complete`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Spawn`] when the waiter thread cannot be
    /// started; `on_complete` is not called in that case.
    pub fn request<F>(&self, topic: &str, on_complete: F) -> Result<JoinHandle<()>, RequestError>
    where
        F: FnOnce(Result<Value, RequestError>) + Send + 'static,
    {
        let issued = self.issue(topic);
        let timeout = self.timeout;
        thread::Builder::new()
            .name("sysmon-request".to_owned())
            .spawn(move || {
                let result = issued.and_then(|pending| pending.wait(timeout));
                on_complete(result);
            })
            .map_err(|error| RequestError::Spawn {
                reason: error.to_string(),
            })
    }

    /// Requests `topic` and blocks the calling thread until it completes.
    ///
    /// # Errors
    ///
    /// Returns any [`RequestError`] raised while issuing or awaiting the
    /// request.
    pub fn request_blocking(&self, topic: &str) -> Result<Value, RequestError> {
        self.issue(topic)?.wait(self.timeout)
    }

    fn issue(&self, topic: &str) -> Result<PendingRequest, RequestError> {
        let message = Message::request(topic);
        let id = message.correlation_id;
        let pending = self.table.register(id, topic)?;
        if self.outbound.send(message).is_err() {
            return Err(RequestError::connection_closed("connection loop has stopped"));
        }
        debug!(target: DISPATCH_TARGET, %id, topic, "request issued");
        Ok(pending)
    }
}
