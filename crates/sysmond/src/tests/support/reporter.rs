//! Test double for [`HealthReporter`] that records structured events for assertions.
//!
//! The recorder captures the collector lifecycle telemetry emitted during
//! bootstrap and serving so tests can validate observable events. The bound
//! address is also published on a channel so a test can connect as soon as
//! the listener is ready.

use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use sysmon_config::Config;
use sysmon_protocol::CloseReason;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The listener was bound.
    Listening,
    /// A dashboard connected.
    ConnectionAccepted,
    /// The serving connection closed.
    ConnectionClosed(CloseReason),
}

/// Records health events for assertions.
#[derive(Debug)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
    bound: Mutex<Sender<SocketAddr>>,
    bound_rx: Mutex<Receiver<SocketAddr>>,
}

impl Default for RecordingHealthReporter {
    fn default() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            events: Mutex::new(Vec::new()),
            bound: Mutex::new(sender),
            bound_rx: Mutex::new(receiver),
        }
    }
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Waits for the listener to report its bound address.
    pub fn bound_addr(&self, timeout: Duration) -> Option<SocketAddr> {
        self.bound_rx
            .lock()
            .expect("health reporter mutex poisoned")
            .recv_timeout(timeout)
            .ok()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listening(&self, addr: SocketAddr) {
        self.record(HealthEvent::Listening);
        self.bound
            .lock()
            .expect("health reporter mutex poisoned")
            .send(addr)
            .expect("bound address receiver dropped");
    }

    fn connection_accepted(&self, _peer: SocketAddr) {
        self.record(HealthEvent::ConnectionAccepted);
    }

    fn connection_closed(&self, _peer: SocketAddr, reason: &CloseReason) {
        self.record(HealthEvent::ConnectionClosed(reason.clone()));
    }
}
