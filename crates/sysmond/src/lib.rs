//! Host metrics collector for the sysmon dashboard.
//!
//! The collector binds a TCP listener, accepts a single dashboard
//! connection, and answers topic requests (`system`, `cpu`, `ram`, `disk`,
//! `network`, `processes`) over the framed request/response protocol from
//! [`sysmon_protocol`]. Each request is served on a bounded worker pool so a
//! slow collector never stalls the connection loop.
//!
//! Launch follows a fixed sequence: load configuration, install structured
//! telemetry, resolve the listening port (prompting the operator when none is
//! configured), bind, accept, and serve until the dashboard disconnects or a
//! termination signal arrives. Health reporting hooks emit structured events
//! at each stage.

mod bootstrap;
mod health;
mod listener;
mod process;
mod telemetry;
pub mod topics;

pub use bootstrap::{BootstrapError, ConfigLoader, Daemon, SystemConfigLoader, bootstrap_with};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use listener::{ListenerError, ServerListener};
pub use process::{
    LaunchError, PortPrompt, ShutdownError, ShutdownSignal, SystemShutdownSignal,
    TerminalPortPrompt, run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
