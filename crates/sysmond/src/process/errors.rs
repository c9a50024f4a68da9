//! Defines the unified error surface for collector launch and supervision.

use thiserror::Error;

use sysmon_config::PromptError;
use sysmon_protocol::{ConnectionError, PoolError};

use crate::bootstrap::BootstrapError;
use crate::listener::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the collector.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the collector failed.
    #[error("collector bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// No port was configured and the operator did not supply one.
    #[error("no listening port available: {source}")]
    Prompt {
        /// Underlying prompt error.
        #[source]
        source: PromptError,
    },
    /// Installing the shutdown listener failed.
    #[error("failed to install shutdown listener: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// Binding the listener failed.
    #[error("collector listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The worker pool could not be started.
    #[error("failed to start topic workers: {source}")]
    Pool {
        /// Underlying pool error.
        #[source]
        source: PoolError,
    },
    /// Starting or stopping the serving connection failed.
    #[error("serving connection failed: {source}")]
    Connection {
        /// Underlying connection error.
        #[source]
        source: ConnectionError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<PromptError> for LaunchError {
    fn from(source: PromptError) -> Self {
        Self::Prompt { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<PoolError> for LaunchError {
    fn from(source: PoolError) -> Self {
        Self::Pool { source }
    }
}

impl From<ConnectionError> for LaunchError {
    fn from(source: ConnectionError) -> Self {
        Self::Connection { source }
    }
}
