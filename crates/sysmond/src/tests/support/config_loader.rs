//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use sysmon_config::{Config, OrthoConfig, OrthoError};

use crate::bootstrap::ConfigLoader;

/// Loader that binds loopback on a kernel-assigned port, or leaves the port
/// unset so launch has to prompt for one.
pub struct TestConfigLoader {
    port: Option<u16>,
}

impl TestConfigLoader {
    /// Loopback on an ephemeral port.
    #[must_use]
    pub const fn ephemeral() -> Self {
        Self { port: Some(0) }
    }

    /// Loopback with no configured port.
    #[must_use]
    pub const fn without_port() -> Self {
        Self { port: None }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            host: "127.0.0.1".to_owned(),
            port: self.port,
            poll_interval_ms: 2,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("sysmond"),
            OsString::from("--port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_iter(args)
    }
}
