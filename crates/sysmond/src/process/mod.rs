use std::time::Duration;

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::{PortPrompt, TerminalPortPrompt, run_daemon};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
/// How often the supervisor checks the shutdown flag while serving.
pub(crate) const SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);
/// Label written before reading a port from the terminal.
pub(crate) const PORT_PROMPT_LABEL: &str = "Server port: ";
