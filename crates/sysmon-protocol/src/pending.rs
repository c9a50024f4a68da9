//! Outstanding requests awaiting a response.
//!
//! Every entry is resolved at most once: a response, a timeout, a
//! cancellation, or the connection-wide failure sweep removes it under the
//! table lock, so whichever happens first wins and the rest find nothing.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::FrameEncodeError;
use crate::connection::{CloseReason, InboundHandler, Outbound};
use crate::errors::RequestError;
use crate::message::{CorrelationId, Message, MessageBody, RemoteErrorKind};

const PENDING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pending");

type Completion = Result<Value, RequestError>;

#[derive(Debug, Default)]
struct TableState {
    entries: HashMap<CorrelationId, SyncSender<Completion>>,
    closed: Option<RequestError>,
}

/// Thread-safe map from correlation id to the waiter of that request.
#[derive(Debug, Default)]
pub struct PendingRequestTable {
    state: Mutex<TableState>,
}

impl PendingRequestTable {
    /// Creates an empty, open table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new outstanding request and returns its waiter.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::DuplicateCorrelation`] when `id` is already
    /// pending, or the sweep error once the table has been failed.
    pub fn register(
        self: &Arc<Self>,
        id: CorrelationId,
        topic: &str,
    ) -> Result<PendingRequest, RequestError> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let mut state = self.lock();
        if let Some(error) = &state.closed {
            return Err(error.clone());
        }
        if state.entries.contains_key(&id) {
            return Err(RequestError::DuplicateCorrelation { id });
        }
        state.entries.insert(id, sender);
        debug!(target: PENDING_TARGET, %id, topic, pending = state.entries.len(), "request registered");
        Ok(PendingRequest {
            id,
            topic: topic.to_owned(),
            receiver,
            table: Arc::clone(self),
        })
    }

    /// Delivers `result` to the waiter registered under `id`.
    ///
    /// Returns `false` when no such entry exists, for example because the
    /// request already timed out.
    pub fn resolve(&self, id: CorrelationId, result: Completion) -> bool {
        let mut state = self.lock();
        let Some(sender) = state.entries.remove(&id) else {
            return false;
        };
        // Sent while locked so a concurrent timeout observes either the entry
        // or the delivered value.
        if sender.try_send(result).is_err() {
            debug!(target: PENDING_TARGET, %id, "waiter already gone");
        }
        true
    }

    /// Removes the entry for `id` without delivering anything.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        self.lock().entries.remove(&id).is_some()
    }

    /// Fails every outstanding request with `error` and refuses new ones.
    ///
    /// Returns the number of requests that were failed.
    pub fn fail_all(&self, error: &RequestError) -> usize {
        let mut state = self.lock();
        state.closed = Some(error.clone());
        let failed = state.entries.len();
        for (id, sender) in state.entries.drain() {
            if sender.try_send(Err(error.clone())).is_err() {
                debug!(target: PENDING_TARGET, %id, "waiter already gone");
            }
        }
        if failed > 0 {
            debug!(target: PENDING_TARGET, failed, %error, "failed outstanding requests");
        }
        failed
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when nothing is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true when `id` is outstanding.
    #[must_use]
    pub fn contains(&self, id: CorrelationId) -> bool {
        self.lock().entries.contains_key(&id)
    }
}

impl InboundHandler for PendingRequestTable {
    fn on_message(&self, message: Message, outbound: &Outbound) {
        let Message {
            correlation_id,
            topic,
            body,
        } = message;
        match body {
            MessageBody::Response { outcome } => {
                if !self.resolve(correlation_id, outcome.into_result(&topic)) {
                    debug!(
                        target: PENDING_TARGET,
                        id = %correlation_id,
                        topic,
                        "discarding response with no pending request"
                    );
                }
            }
            MessageBody::Request => {
                warn!(target: PENDING_TARGET, topic, "peer sent a request to a client connection");
                let reply = Message::error(
                    correlation_id,
                    topic,
                    RemoteErrorKind::UnknownTopic,
                    "client connections do not serve topics",
                );
                if outbound.send(reply).is_err() {
                    debug!(target: PENDING_TARGET, "connection closed before reply was queued");
                }
            }
        }
    }

    fn on_undeliverable(&self, message: &Message, error: &FrameEncodeError) {
        self.resolve(
            message.correlation_id,
            Err(RequestError::Undeliverable {
                topic: message.topic.clone(),
                reason: error.to_string(),
            }),
        );
    }

    fn connection_closed(&self, reason: &CloseReason) {
        self.fail_all(&RequestError::connection_closed(reason.to_string()));
    }
}

/// Waiter for a single outstanding request.
///
/// Dropping the waiter removes its table entry.
#[derive(Debug)]
pub struct PendingRequest {
    id: CorrelationId,
    topic: String,
    receiver: Receiver<Completion>,
    table: Arc<PendingRequestTable>,
}

impl PendingRequest {
    /// Blocks until the request completes or `timeout` elapses.
    ///
    /// `None` waits until a response arrives or the connection fails.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, [`RequestError::Timeout`], or
    /// [`RequestError::ConnectionClosed`].
    pub fn wait(self, timeout: Option<Duration>) -> Result<Value, RequestError> {
        let received = match timeout {
            Some(bound) => self.receiver.recv_timeout(bound),
            None => self
                .receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(completion) => completion,
            Err(RecvTimeoutError::Timeout) => self.expire(timeout.unwrap_or_default()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(RequestError::connection_closed("pending request was dropped"))
            }
        }
    }

    fn expire(&self, after: Duration) -> Completion {
        let timed_out = RequestError::Timeout {
            topic: self.topic.clone(),
            after,
        };
        if self.table.cancel(self.id) {
            debug!(target: PENDING_TARGET, id = %self.id, topic = %self.topic, "request timed out");
            return Err(timed_out);
        }
        // The entry was resolved between the timeout and the cancel.
        self.receiver.try_recv().unwrap_or(Err(timed_out))
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.table.cancel(self.id);
    }
}
