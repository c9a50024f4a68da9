//! Connection to the collector and the fetch/watch request loops.

use std::io::{BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

use sysmon_config::{Config, ServerEndpoint, prompt_port};
use sysmon_protocol::{Client, ConnectionSettings};

use crate::AppError;
use crate::cli::Topic;

const PORT_PROMPT_LABEL: &str = "Server port: ";

/// How watch mode paces and bounds its requests.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WatchPlan {
    pub(crate) interval: Duration,
    pub(crate) count: Option<u64>,
}

/// Configured endpoint, or one built from a port read from `input`.
pub(crate) fn resolve_endpoint<R, E>(
    config: &Config,
    input: &mut R,
    prompt: &mut E,
) -> Result<ServerEndpoint, AppError>
where
    R: BufRead,
    E: Write,
{
    if let Some(endpoint) = config.endpoint() {
        return Ok(endpoint);
    }
    let port = prompt_port(PORT_PROMPT_LABEL, input, prompt)?;
    Ok(config.endpoint_with_port(port))
}

pub(crate) fn connection_settings(config: &Config) -> ConnectionSettings {
    ConnectionSettings {
        poll_interval: config.poll_interval(),
        max_frame_bytes: config.max_frame_bytes(),
        request_timeout: config.request_timeout(),
    }
}

pub(crate) fn connect(
    endpoint: &ServerEndpoint,
    settings: &ConnectionSettings,
) -> Result<Client, AppError> {
    let addr = endpoint.resolve().map_err(|source| AppError::Resolve {
        endpoint: endpoint.clone(),
        source,
    })?;
    Client::connect(addr, settings).map_err(|source| AppError::Connect {
        endpoint: endpoint.clone(),
        source,
    })
}

/// Requests `topic` once and hands the value to `emit`.
pub(crate) fn fetch<F>(client: &Client, topic: Topic, mut emit: F) -> Result<(), AppError>
where
    F: FnMut(&Value) -> Result<(), AppError>,
{
    let value = client.request_blocking(topic.as_str())?;
    emit(&value)
}

/// Requests `topic` repeatedly through the asynchronous request API until
/// `plan.count` results have been emitted or a request fails.
///
/// Returns the number of results emitted.
pub(crate) fn watch<F>(
    client: &Client,
    topic: Topic,
    plan: WatchPlan,
    mut emit: F,
) -> Result<u64, AppError>
where
    F: FnMut(&Value) -> Result<(), AppError>,
{
    let (sender, results) = mpsc::channel();
    let mut emitted = 0u64;
    loop {
        let completion = sender.clone();
        let waiter = client.request(topic.as_str(), move |result| {
            completion.send(result).ok();
        })?;
        let result = results.recv().map_err(|_| AppError::MissingResult)?;
        if waiter.join().is_err() {
            return Err(AppError::MissingResult);
        }

        emit(&result?)?;
        emitted += 1;
        if plan.count.is_some_and(|count| emitted >= count) {
            return Ok(emitted);
        }
        thread::sleep(plan.interval);
    }
}
