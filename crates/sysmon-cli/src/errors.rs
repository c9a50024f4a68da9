//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use sysmon_config::{PromptError, ServerEndpoint};
use sysmon_protocol::{ConnectionError, RequestError};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("no collector port available: {0}")]
    Prompt(#[from] PromptError),
    #[error("failed to resolve collector address {endpoint}: {source}")]
    Resolve {
        endpoint: ServerEndpoint,
        source: io::Error,
    },
    #[error("failed to connect to collector at {endpoint}: {source}")]
    Connect {
        endpoint: ServerEndpoint,
        source: ConnectionError,
    },
    #[error("request failed: {0}")]
    Request(#[from] RequestError),
    #[error("request completed without delivering a result")]
    MissingResult,
    #[error("failed to render result: {0}")]
    Render(serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(#[from] io::Error),
}
