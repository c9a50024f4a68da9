//! The loop thread behind a [`Connection`](super::Connection).

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::{CONNECTION_TARGET, CloseReason, ConnectionSettings, InboundHandler, Outbound};
use super::state::{ConnectionState, StateCell};
use crate::codec::{FrameCodec, FrameDecodeError, FrameDecoder, FrameEncodeError};
use crate::message::{Message, MessageBody, Outcome, RemoteErrorKind};

const READ_CHUNK: usize = 8 * 1024;
/// Reads per iteration before the loop turns back to outbound work.
const READS_PER_TURN: usize = 16;
/// Longest error detail carried by a replacement reply.
const FALLBACK_DETAIL_CHARS: usize = 256;

enum ReadProgress {
    Idle,
    Data,
    Eof,
}

pub(super) struct Driver {
    stream: TcpStream,
    queue: Receiver<Message>,
    outbound: Outbound,
    handler: Arc<dyn InboundHandler>,
    stop: Arc<AtomicBool>,
    codec: FrameCodec,
    decoder: FrameDecoder,
    pending_write: Vec<u8>,
    written: usize,
    poll_interval: Duration,
}

impl Driver {
    pub(super) fn new(
        stream: TcpStream,
        queue: Receiver<Message>,
        outbound: Outbound,
        handler: Arc<dyn InboundHandler>,
        stop: Arc<AtomicBool>,
        settings: &ConnectionSettings,
    ) -> Self {
        let codec = settings.codec();
        Self {
            stream,
            queue,
            outbound,
            handler,
            stop,
            codec,
            decoder: FrameDecoder::new(codec),
            pending_write: Vec::new(),
            written: 0,
            poll_interval: settings.poll_interval,
        }
    }

    /// Runs until the connection ends, then fails pending work and releases
    /// the socket.
    pub(super) fn run(mut self, state: &StateCell) {
        let reason = self.drive();
        info!(target: CONNECTION_TARGET, reason = %reason, "connection closing");
        state.begin_closing(reason.clone());
        self.handler.connection_closed(&reason);

        if let Err(error) = self.stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(target: CONNECTION_TARGET, %error, "socket shutdown failed");
        }
        drop(self);
        state.advance(ConnectionState::Closed);
    }

    fn drive(&mut self) -> CloseReason {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return CloseReason::Requested;
            }
            let mut progressed = self.drain_queue();
            match self.flush() {
                Ok(wrote) => progressed |= wrote,
                Err(error) => return CloseReason::Io(error.to_string()),
            }
            match self.read_inbound() {
                Ok(ReadProgress::Eof) => return CloseReason::PeerClosed,
                Ok(ReadProgress::Data) => progressed = true,
                Ok(ReadProgress::Idle) => {}
                Err(reason) => return reason,
            }
            if !progressed {
                self.wait_for_work();
            }
        }
    }

    fn drain_queue(&mut self) -> bool {
        let mut queued = false;
        while let Ok(message) = self.queue.try_recv() {
            self.enqueue(message);
            queued = true;
        }
        queued
    }

    fn wait_for_work(&mut self) {
        if self.has_pending_write() {
            // The socket is not accepting bytes yet.
            thread::sleep(self.poll_interval);
            return;
        }
        match self.queue.recv_timeout(self.poll_interval) {
            Ok(message) => self.enqueue(message),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
        }
    }

    fn enqueue(&mut self, message: Message) {
        match self.codec.encode(&message) {
            Ok(frame) => {
                trace!(
                    target: CONNECTION_TARGET,
                    id = %message.correlation_id,
                    topic = %message.topic,
                    bytes = frame.len(),
                    "frame queued"
                );
                self.pending_write.extend_from_slice(&frame);
            }
            Err(error) => self.reject_unencodable(&message, &error),
        }
    }

    fn reject_unencodable(&mut self, message: &Message, error: &FrameEncodeError) {
        warn!(
            target: CONNECTION_TARGET,
            id = %message.correlation_id,
            topic = %message.topic,
            %error,
            "message cannot be framed"
        );
        if let MessageBody::Response { outcome } = &message.body {
            let (kind, detail) = match outcome {
                Outcome::Ok { .. } => (
                    RemoteErrorKind::Handler,
                    format!("response could not be sent: {error}"),
                ),
                Outcome::Error(descriptor) => (descriptor.kind, descriptor.message.clone()),
            };
            // Every response must still resolve its request.
            if let Some(frame) = self.fallback_frame(message, kind, &detail) {
                self.pending_write.extend_from_slice(&frame);
                return;
            }
        }
        self.handler.on_undeliverable(message, error);
    }

    /// Frames an error reply for `message`, shedding the detail and then the
    /// echoed topic until it fits.
    fn fallback_frame(
        &self,
        message: &Message,
        kind: RemoteErrorKind,
        detail: &str,
    ) -> Option<Vec<u8>> {
        let detail = bounded(detail, FALLBACK_DETAIL_CHARS);
        let topic = message.topic.as_str();
        [(topic, detail.as_str()), (topic, ""), ("", "")]
            .into_iter()
            .find_map(|(topic, text)| {
                self.codec
                    .encode(&Message::error(message.correlation_id, topic, kind, text))
                    .ok()
            })
    }

    fn has_pending_write(&self) -> bool {
        self.written < self.pending_write.len()
    }

    fn flush(&mut self) -> io::Result<bool> {
        let mut wrote = false;
        while let Some(unsent) = self.pending_write.get(self.written..).filter(|rest| !rest.is_empty()) {
            match self.stream.write(unsent) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(count) => {
                    self.written += count;
                    wrote = true;
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
        if !self.has_pending_write() {
            self.pending_write.clear();
            self.written = 0;
        }
        Ok(wrote)
    }

    fn read_inbound(&mut self) -> Result<ReadProgress, CloseReason> {
        let mut chunk = [0_u8; READ_CHUNK];
        let mut progress = ReadProgress::Idle;
        for _ in 0..READS_PER_TURN {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.dispatch_decoded()?;
                    return Ok(ReadProgress::Eof);
                }
                Ok(count) => {
                    self.decoder.feed(chunk.get(..count).unwrap_or_default());
                    self.dispatch_decoded()?;
                    progress = ReadProgress::Data;
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(CloseReason::Io(error.to_string())),
            }
        }
        Ok(progress)
    }

    fn dispatch_decoded(&mut self) -> Result<(), CloseReason> {
        loop {
            match self.decoder.next_message() {
                Ok(Some(message)) => {
                    trace!(
                        target: CONNECTION_TARGET,
                        id = %message.correlation_id,
                        topic = %message.topic,
                        "frame received"
                    );
                    self.handler.on_message(message, &self.outbound);
                }
                Ok(None) => return Ok(()),
                Err(error) => return Err(decode_failure(&error)),
            }
        }
    }
}

fn bounded(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn decode_failure(error: &FrameDecodeError) -> CloseReason {
    warn!(target: CONNECTION_TARGET, %error, "closing connection after undecodable frame");
    CloseReason::Decode(error.to_string())
}
