use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::flag;
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Arms the mechanism and returns the flag it raises when the collector
    /// should stop.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the mechanism cannot be installed.
    fn install(&self) -> Result<Arc<AtomicBool>, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that raises its flag on termination signals.
///
/// A second signal while the first is still being handled terminates the
/// process immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds a signal listener.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn install(&self) -> Result<Arc<AtomicBool>, ShutdownError> {
        let raised = Arc::new(AtomicBool::new(false));
        for signal in TERMINATION_SIGNALS {
            flag::register_conditional_shutdown(signal, 1, Arc::clone(&raised))
                .map_err(|source| ShutdownError::Install { source })?;
            flag::register(signal, Arc::clone(&raised))
                .map_err(|source| ShutdownError::Install { source })?;
        }
        debug!(target: PROCESS_TARGET, signals = ?TERMINATION_SIGNALS, "signal handlers installed");
        Ok(raised)
    }
}
