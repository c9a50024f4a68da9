//! Server-side routing of requests to topic handlers.
//!
//! The router is the [`InboundHandler`] of a serving connection. Each request
//! is matched against the registered topics and, when a handler exists, run on
//! the [`WorkerPool`] so slow collectors never stall the connection loop.
//! Unknown topics, handler failures, and a saturated pool are all answered
//! with an error response carrying the request's correlation id.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::connection::{CloseReason, InboundHandler, Outbound};
use crate::errors::HandlerError;
use crate::message::{CorrelationId, Message, MessageBody, RemoteErrorKind};
use crate::pool::{PoolError, WorkerPool};

const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");

/// Produces the current value of one topic.
pub type TopicHandler = Arc<dyn Fn() -> Result<Value, HandlerError> + Send + Sync>;

/// Maps topic names to handlers and runs them on a worker pool.
pub struct RequestRouter {
    handlers: HashMap<String, TopicHandler>,
    pool: WorkerPool,
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RequestRouter")
            .field("topics", &self.topics())
            .field("pool", &self.pool)
            .finish()
    }
}

impl RequestRouter {
    /// Creates a router with no topics.
    #[must_use]
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            handlers: HashMap::new(),
            pool,
        }
    }

    /// Registers `handler` for `topic`, replacing any earlier registration.
    pub fn register_topic<F>(&mut self, topic: impl Into<String>, handler: F)
    where
        F: Fn() -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let topic = topic.into();
        debug!(target: ROUTER_TARGET, topic = %topic, "topic registered");
        if self.handlers.insert(topic.clone(), Arc::new(handler)).is_some() {
            warn!(target: ROUTER_TARGET, topic = %topic, "replaced existing topic handler");
        }
    }

    /// Registered topic names in sorted order.
    #[must_use]
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Stops the worker pool after queued handlers finish.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    fn route(&self, id: CorrelationId, topic: String, outbound: &Outbound) {
        let Some(handler) = self.handlers.get(&topic).map(Arc::clone) else {
            debug!(target: ROUTER_TARGET, %id, topic = %topic, "unknown topic");
            let message = format!("no handler registered for '{topic}'");
            reply(
                outbound,
                Message::error(id, topic, RemoteErrorKind::UnknownTopic, message),
            );
            return;
        };

        let job_outbound = outbound.clone();
        let job_topic = topic.clone();
        let queued = self.pool.try_execute(move || {
            let response = run_handler(&handler, id, job_topic);
            reply(&job_outbound, response);
        });
        if let Err(error) = queued {
            warn!(target: ROUTER_TARGET, %id, topic = %topic, %error, "rejecting request");
            let kind = match error {
                PoolError::Saturated => RemoteErrorKind::Busy,
                PoolError::ShutDown | PoolError::Spawn(_) => RemoteErrorKind::Handler,
            };
            reply(outbound, Message::error(id, topic, kind, error.to_string()));
        }
    }
}

impl InboundHandler for RequestRouter {
    fn on_message(&self, message: Message, outbound: &Outbound) {
        match message.body {
            MessageBody::Request => self.route(message.correlation_id, message.topic, outbound),
            MessageBody::Response { .. } => {
                warn!(
                    target: ROUTER_TARGET,
                    id = %message.correlation_id,
                    topic = %message.topic,
                    "ignoring response sent to the server"
                );
            }
        }
    }

    fn connection_closed(&self, reason: &CloseReason) {
        info!(target: ROUTER_TARGET, %reason, "serving connection closed");
    }
}

fn run_handler(handler: &TopicHandler, id: CorrelationId, topic: String) -> Message {
    match panic::catch_unwind(AssertUnwindSafe(|| handler())) {
        Ok(Ok(value)) => Message::ok(id, topic, value),
        Ok(Err(error)) => {
            warn!(target: ROUTER_TARGET, %id, topic = %topic, %error, "handler failed");
            Message::error(id, topic, RemoteErrorKind::Handler, error.message())
        }
        Err(_) => {
            warn!(target: ROUTER_TARGET, %id, topic = %topic, "handler panicked");
            Message::error(id, topic, RemoteErrorKind::Handler, "handler panicked")
        }
    }
}

fn reply(outbound: &Outbound, message: Message) {
    if outbound.send(message).is_err() {
        debug!(target: ROUTER_TARGET, "connection closed before the reply was queued");
    }
}
