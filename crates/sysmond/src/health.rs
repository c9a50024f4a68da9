//! Structured health reporting for collector lifecycle events.

use std::net::SocketAddr;

use sysmon_config::Config;
use sysmon_protocol::CloseReason;

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the listener is bound.
    fn listening(&self, addr: SocketAddr);

    /// Invoked when the dashboard connects.
    fn connection_accepted(&self, peer: SocketAddr);

    /// Invoked after the serving connection has closed.
    fn connection_closed(&self, peer: SocketAddr, reason: &CloseReason);
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting collector bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            host = %config.host,
            port = ?config.port,
            worker_threads = config.worker_threads(),
            log_format = %config.log_format(),
            "collector bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "collector bootstrap failed"
        );
    }

    fn listening(&self, addr: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listening",
            %addr,
            "waiting for the dashboard to connect"
        );
    }

    fn connection_accepted(&self, peer: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connection_accepted",
            %peer,
            "dashboard connected"
        );
    }

    fn connection_closed(&self, peer: SocketAddr, reason: &CloseReason) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connection_closed",
            %peer,
            %reason,
            "dashboard connection closed"
        );
    }
}
