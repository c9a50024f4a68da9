//! Shared fixtures for unit tests.

use std::net::{TcpListener, TcpStream};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::connection::{CloseReason, InboundHandler, Outbound};
use crate::message::{Message, MessageBody};

/// Returns both ends of a fresh loopback TCP connection.
pub(crate) fn loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    let client = TcpStream::connect(addr).expect("connect loopback");
    let (server, _) = listener.accept().expect("accept loopback");
    (client, server)
}

/// Polls `condition` until it holds or five seconds pass.
pub(crate) fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Handler that records everything and optionally echoes requests.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    echo: bool,
    messages: Mutex<Vec<Message>>,
    closes: Mutex<Vec<CloseReason>>,
}

impl Recorder {
    pub(crate) fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    pub(crate) fn messages(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().expect("messages lock")
    }

    pub(crate) fn closes(&self) -> Vec<CloseReason> {
        self.closes.lock().expect("closes lock").clone()
    }
}

impl InboundHandler for Recorder {
    fn on_message(&self, message: Message, outbound: &Outbound) {
        if self.echo && matches!(message.body, MessageBody::Request) {
            let reply = Message::ok(
                message.correlation_id,
                message.topic.clone(),
                serde_json::Value::String(message.topic.clone()),
            );
            outbound.send(reply).expect("queue echo");
        }
        self.messages().push(message);
    }

    fn connection_closed(&self, reason: &CloseReason) {
        self.closes.lock().expect("closes lock").push(reason.clone());
    }
}
