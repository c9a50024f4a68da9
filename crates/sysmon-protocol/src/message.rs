//! Logical messages exchanged between the dashboard and the collector.
//!
//! Every frame on the wire carries exactly one [`Message`]. Requests name a
//! topic and carry no payload; responses echo the request's correlation id and
//! topic and carry an [`Outcome`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::RequestError;

/// Opaque token linking a request to its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a random identifier.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }

}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Token shared by a request and its response.
    pub correlation_id: CorrelationId,
    /// Dataset the request targets.
    pub topic: String,
    /// Request marker or response outcome.
    pub body: MessageBody,
}

/// Distinguishes requests from responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Asks the peer to produce the topic's current value.
    Request,
    /// Carries the outcome of an earlier request.
    Response {
        /// Value or error produced for the request.
        outcome: Outcome,
    },
}

/// Result carried by a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The handler produced a value.
    Ok {
        /// Topic-specific structured value.
        value: Value,
    },
    /// The request failed on the serving side.
    Error(ErrorDescriptor),
}

/// Serialisable description of a failure reported by the serving side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Failure category.
    pub kind: RemoteErrorKind,
    /// Human readable detail.
    pub message: String,
}

/// Failure categories that travel inside responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// No handler is registered for the topic.
    UnknownTopic,
    /// The handler failed or panicked.
    Handler,
    /// The server had no capacity to run the handler.
    Busy,
}

impl Message {
    /// Builds a request for `topic` with a fresh correlation id.
    #[must_use]
    pub fn request(topic: impl Into<String>) -> Self {
        Self::request_with_id(CorrelationId::fresh(), topic)
    }

    /// Builds a request with an explicit correlation id.
    #[must_use]
    pub fn request_with_id(correlation_id: CorrelationId, topic: impl Into<String>) -> Self {
        Self {
            correlation_id,
            topic: topic.into(),
            body: MessageBody::Request,
        }
    }

    /// Builds a successful response.
    #[must_use]
    pub fn ok(correlation_id: CorrelationId, topic: impl Into<String>, value: Value) -> Self {
        Self::response(correlation_id, topic, Outcome::Ok { value })
    }

    /// Builds a failed response.
    #[must_use]
    pub fn error(
        correlation_id: CorrelationId,
        topic: impl Into<String>,
        kind: RemoteErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::response(
            correlation_id,
            topic,
            Outcome::Error(ErrorDescriptor {
                kind,
                message: message.into(),
            }),
        )
    }

    fn response(correlation_id: CorrelationId, topic: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            correlation_id,
            topic: topic.into(),
            body: MessageBody::Response { outcome },
        }
    }

}

impl Outcome {
    /// Converts the outcome into the result handed to the requester.
    ///
    /// # Errors
    ///
    /// Maps each [`RemoteErrorKind`] onto the matching [`RequestError`].
    pub fn into_result(self, topic: &str) -> Result<Value, RequestError> {
        match self {
            Self::Ok { value } => Ok(value),
            Self::Error(ErrorDescriptor { kind, message }) => Err(match kind {
                RemoteErrorKind::UnknownTopic => RequestError::unknown_topic(topic),
                RemoteErrorKind::Handler => RequestError::handler(topic, message),
                RemoteErrorKind::Busy => RequestError::busy(topic),
            }),
        }
    }
}
