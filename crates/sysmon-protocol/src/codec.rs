//! Length-prefixed framing.
//!
//! A frame is a four byte big-endian payload length followed by the payload,
//! a JSON-encoded [`Message`]. The declared length is validated before any
//! buffer is sized from it, so a hostile prefix cannot force a large
//! allocation.

use thiserror::Error;

use crate::message::Message;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Errors raised while decoding inbound frames.
#[derive(Debug, Error)]
pub enum FrameDecodeError {
    /// The length prefix declared an empty payload.
    #[error("frame declares an empty payload")]
    EmptyFrame,
    /// The length prefix exceeds the configured maximum.
    #[error("frame of {length} bytes exceeds the {max} byte limit")]
    Oversized {
        /// Declared payload length.
        length: u32,
        /// Configured maximum.
        max: u32,
    },
    /// The payload is not a valid message.
    #[error("malformed frame payload: {0}")]
    Payload(#[source] serde_json::Error),
}

/// Errors raised while encoding outbound messages.
#[derive(Debug, Error)]
pub enum FrameEncodeError {
    /// The message could not be serialised.
    #[error("failed to serialise message: {0}")]
    Serialise(#[source] serde_json::Error),
    /// The serialised payload exceeds the configured maximum.
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    Oversized {
        /// Serialised payload length.
        size: usize,
        /// Configured maximum.
        max: u32,
    },
}

/// Stateless frame encoder and decoder bound to a size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_frame_bytes: u32,
}

impl FrameCodec {
    /// Creates a codec accepting payloads of at most `max_frame_bytes`.
    #[must_use]
    pub const fn new(max_frame_bytes: u32) -> Self {
        Self { max_frame_bytes }
    }

    /// Largest payload this codec accepts.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> u32 {
        self.max_frame_bytes
    }

    /// Serialises `message` into a complete frame.
    ///
    /// # Errors
    ///
    /// Fails when serialisation fails or the payload exceeds the limit.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, FrameEncodeError> {
        let payload = serde_json::to_vec(message).map_err(FrameEncodeError::Serialise)?;
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|length| *length <= self.max_frame_bytes)
            .ok_or(FrameEncodeError::Oversized {
                size: payload.len(),
                max: self.max_frame_bytes,
            })?;

        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&length.to_be_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Attempts to decode one frame from the front of `buffer`.
    ///
    /// Returns `Ok(None)` while the frame is incomplete. On success the
    /// message is returned with the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Fails as soon as the prefix is invalid, or once the complete payload
    /// fails to parse.
    pub fn decode_frame(&self, buffer: &[u8]) -> Result<Option<(Message, usize)>, FrameDecodeError> {
        let Some((header, rest)) = buffer.split_first_chunk::<HEADER_LEN>() else {
            return Ok(None);
        };
        let length = self.validate_length(u32::from_be_bytes(*header))?;
        let Some(payload) = rest.get(..length) else {
            return Ok(None);
        };
        let message = serde_json::from_slice(payload).map_err(FrameDecodeError::Payload)?;
        Ok(Some((message, HEADER_LEN + length)))
    }

    fn validate_length(&self, declared: u32) -> Result<usize, FrameDecodeError> {
        let oversized = FrameDecodeError::Oversized {
            length: declared,
            max: self.max_frame_bytes,
        };
        if declared == 0 {
            return Err(FrameDecodeError::EmptyFrame);
        }
        if declared > self.max_frame_bytes {
            return Err(oversized);
        }
        usize::try_from(declared).map_err(|_| oversized)
    }
}

/// Reassembles messages from an arbitrarily chunked byte stream.
#[derive(Debug)]
pub struct FrameDecoder {
    codec: FrameCodec,
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub const fn new(codec: FrameCodec) -> Self {
        Self {
            codec,
            buffer: Vec::new(),
        }
    }

    /// Appends freshly read bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pops the next complete message, if one is buffered.
    ///
    /// # Errors
    ///
    /// Propagates [`FrameDecodeError`]; the stream cannot be resynchronised
    /// afterwards and the connection should be closed.
    pub fn next_message(&mut self) -> Result<Option<Message>, FrameDecodeError> {
        match self.codec.decode_frame(&self.buffer)? {
            Some((message, consumed)) => {
                self.buffer.drain(..consumed);
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    /// Bytes held that do not yet form a complete frame.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
