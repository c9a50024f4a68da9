//! Shared configuration for the sysmon server and client.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! TOML file named by `--config-path`, then `SYSMON_*` environment variables,
//! then command-line flags. Both binaries read the same [`Config`] so a single
//! file can describe the endpoint and protocol tuning for either side.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;
mod prompt;

pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_MAX_FRAME_BYTES, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_WORKER_QUEUE_DEPTH, DEFAULT_WORKER_THREADS, default_host,
    default_log_filter_string, default_log_format,
};
pub use endpoint::{EndpointParseError, ServerEndpoint};
pub use logging::{LogFormat, LogFormatParseError};
pub use ortho_config::{OrthoConfig, OrthoError};
pub use prompt::{PromptError, prompt_port};

/// Resolved configuration shared by `sysmond` and `sysmon`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "SYSMON")]
pub struct Config {
    /// Host to bind (server) or connect to (client).
    #[serde(default = "defaults::default_host")]
    pub host: String,
    /// TCP port; both binaries prompt for one when unset.
    #[serde(default)]
    pub port: Option<u16>,
    /// `tracing` filter directive, for example `info` or `sysmond=debug`.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// How long a caller waits for a response; `0` waits indefinitely.
    #[serde(default = "defaults::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Readiness wait of the connection loop between idle iterations.
    #[serde(default = "defaults::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Largest frame payload accepted or produced.
    #[serde(default = "defaults::default_max_frame_bytes")]
    pub max_frame_bytes: u32,
    /// Number of server threads running topic handlers.
    #[serde(default = "defaults::default_worker_threads")]
    pub worker_threads: usize,
    /// Handler jobs allowed to queue before the server answers `busy`.
    #[serde(default = "defaults::default_worker_queue_depth")]
    pub worker_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            worker_threads: DEFAULT_WORKER_THREADS,
            worker_queue_depth: DEFAULT_WORKER_QUEUE_DEPTH,
        }
    }
}

impl Config {
    /// Endpoint described by `host` and `port`, when a port is configured.
    #[must_use]
    pub fn endpoint(&self) -> Option<ServerEndpoint> {
        self.port.map(|port| self.endpoint_with_port(port))
    }

    /// Endpoint built from the configured host and an explicit port.
    #[must_use]
    pub fn endpoint_with_port(&self, port: u16) -> ServerEndpoint {
        ServerEndpoint::new(self.host.clone(), port)
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Per-request wait bound, or `None` when timeouts are disabled.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.request_timeout_ms))
        }
    }

    /// Idle readiness wait of the connection loop, never below one millisecond.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Largest frame payload in bytes.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> u32 {
        self.max_frame_bytes
    }

    /// Worker thread count, never below one.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.worker_threads.max(1)
    }

    /// Worker queue depth, never below one.
    #[must_use]
    pub fn worker_queue_depth(&self) -> usize {
        self.worker_queue_depth.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_endpoint() {
        assert_eq!(Config::default().endpoint(), None);
    }

    #[test]
    fn endpoint_uses_configured_host() {
        let config = Config {
            host: "10.0.0.5".to_owned(),
            port: Some(4000),
            ..Config::default()
        };
        assert_eq!(config.endpoint(), Some(ServerEndpoint::new("10.0.0.5", 4000)));
    }

    #[test]
    fn zero_timeout_disables_bound() {
        let config = Config {
            request_timeout_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), None);
        assert_eq!(
            Config::default().request_timeout(),
            Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS))
        );
    }

    #[test]
    fn clamps_degenerate_tuning_values() {
        let config = Config {
            poll_interval_ms: 0,
            worker_threads: 0,
            worker_queue_depth: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.worker_threads(), 1);
        assert_eq!(config.worker_queue_depth(), 1);
    }
}
