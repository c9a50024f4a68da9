//! Default values shared by the server and client binaries.

/// Host the server binds to and the client connects to by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default bound on how long a caller waits for a response.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default readiness wait used by the connection loop between iterations.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Largest frame payload accepted or produced on the wire (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Number of server threads executing topic handlers.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Number of handler jobs allowed to wait for a free worker.
pub const DEFAULT_WORKER_QUEUE_DEPTH: usize = 64;

/// Default host as an owned value for serde defaults.
pub fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

pub(crate) const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

pub(crate) const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

pub(crate) const fn default_max_frame_bytes() -> u32 {
    DEFAULT_MAX_FRAME_BYTES
}

pub(crate) const fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

pub(crate) const fn default_worker_queue_depth() -> usize {
    DEFAULT_WORKER_QUEUE_DEPTH
}
