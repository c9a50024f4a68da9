//! Structured logging for the collector.
//!
//! Collector and protocol events share one subscriber on stderr. Connection
//! loops and pool workers run on named threads, so every record carries the
//! thread name alongside its `sysmond::*` or `sysmon_protocol::*` target.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use sysmon_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

/// Format of the subscriber installed by the first successful call.
static INSTALLED_FORMAT: OnceCell<LogFormat> = OnceCell::new();

/// Proof that the collector's subscriber is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Format of the installed subscriber, which may differ from a later
    /// configuration's `log_format`.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured `log_filter` did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Filter expression as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Installing the tracing subscriber failed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Subscriber settings resolved from the collector configuration.
struct LogSettings {
    filter: EnvFilter,
    format: LogFormat,
    ansi: bool,
}

impl LogSettings {
    fn from_config(config: &Config, ansi: bool) -> Result<Self, TelemetryError> {
        let filter =
            EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
                filter: config.log_filter().to_owned(),
                message: error.to_string(),
            })?;
        Ok(Self {
            filter,
            format: config.log_format(),
            ansi,
        })
    }

    fn into_subscriber(self) -> Box<dyn Subscriber + Send + Sync> {
        let builder = fmt::Subscriber::builder()
            .with_env_filter(self.filter)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(self.ansi)
            .with_timer(fmt::time::UtcTime::rfc_3339());
        match self.format {
            LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
            LogFormat::Compact => Box::new(builder.compact().finish()),
        }
    }
}

/// Installs the collector's subscriber on first use.
///
/// Later calls leave the global state alone and return a handle describing
/// the subscriber that is already installed.
///
/// # Errors
///
/// Fails when `log_filter` is invalid or another subscriber is already
/// installed globally.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let format = INSTALLED_FORMAT.get_or_try_init(|| install(config))?;
    Ok(TelemetryHandle { format: *format })
}

fn install(config: &Config) -> Result<LogFormat, TelemetryError> {
    let settings = LogSettings::from_config(config, io::stderr().is_terminal())?;
    let format = settings.format;
    tracing::subscriber::set_global_default(settings.into_subscriber())
        .map_err(TelemetryError::Subscriber)?;
    debug!(
        target: TELEMETRY_TARGET,
        %format,
        filter = config.log_filter(),
        "telemetry installed"
    );
    Ok(format)
}
