//! Supervises collector launch sequencing and the serving connection.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use sysmon_config::{Config, PromptError, ServerEndpoint, prompt_port};
use sysmon_protocol::{Connection, ConnectionSettings, RequestRouter, WorkerPool};

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::HealthReporter;
use crate::listener::ServerListener;
use crate::topics;

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PORT_PROMPT_LABEL, PROCESS_TARGET, SUPERVISE_INTERVAL};

/// Source of a listening port when none is configured.
pub trait PortPrompt: Send + Sync {
    /// Asks for a port.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when no valid port is supplied.
    fn prompt(&self) -> Result<u16, PromptError>;
}

/// Prompts on standard error and reads the answer from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPortPrompt;

impl PortPrompt for TerminalPortPrompt {
    fn prompt(&self) -> Result<u16, PromptError> {
        let mut input = io::stdin().lock();
        let mut output = io::stderr().lock();
        prompt_port(PORT_PROMPT_LABEL, &mut input, &mut output)
    }
}

/// Process-level collaborators needed to control the collector lifecycle.
pub(crate) struct ProcessControl<S, P> {
    pub(crate) shutdown: S,
    pub(crate) prompt: P,
}

/// Service dependencies required to construct the collector runtime.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Collaborators required to launch the collector runtime.
pub(crate) struct LaunchPlan<L, S, P> {
    pub(crate) process: ProcessControl<S, P>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the collector using the production collaborators.
///
/// Serves exactly one dashboard connection and returns once it closes or a
/// termination signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when any launch stage fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        process: ProcessControl {
            shutdown: SystemShutdownSignal::new(),
            prompt: TerminalPortPrompt,
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
        },
    };
    run_daemon_with(plan)
}

/// Runs the collector with injected collaborators.
pub(crate) fn run_daemon_with<L, S, P>(plan: LaunchPlan<L, S, P>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    P: PortPrompt,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl { shutdown, prompt } = process;
    let ServiceDeps { loader, reporter } = services;

    let config = bootstrap_with(&loader, reporter.as_ref())?.into_config();
    info!(target: PROCESS_TARGET, "starting collector runtime");

    let endpoint = resolve_endpoint(&config, &prompt)?;
    let stop = shutdown.install()?;
    let listener = ServerListener::bind(&endpoint)?;
    reporter.listening(listener.local_addr());

    let Some(stream) = listener.accept_one(&stop) else {
        info!(target: PROCESS_TARGET, "shutdown requested before a dashboard connected");
        return Ok(());
    };
    drop(listener);

    let router = Arc::new(build_router(&config)?);
    let connection = Connection::spawn(stream, router.clone(), &connection_settings(&config))?;
    let peer = connection.peer_addr();
    reporter.connection_accepted(peer);

    supervise(&connection, &stop);

    let reason = connection.close()?;
    router.shutdown();
    reporter.connection_closed(peer, &reason);
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

fn resolve_endpoint<P: PortPrompt>(config: &Config, prompt: &P) -> Result<ServerEndpoint, LaunchError> {
    if let Some(endpoint) = config.endpoint() {
        return Ok(endpoint);
    }
    let port = prompt.prompt()?;
    Ok(config.endpoint_with_port(port))
}

fn build_router(config: &Config) -> Result<RequestRouter, LaunchError> {
    let pool = WorkerPool::new(config.worker_threads(), config.worker_queue_depth())?;
    let mut router = RequestRouter::new(pool);
    topics::register_all(&mut router);
    Ok(router)
}

/// Blocks until the connection closes on its own or `stop` is raised.
fn supervise(connection: &Connection, stop: &AtomicBool) {
    while !connection.wait_closed(SUPERVISE_INTERVAL) {
        if stop.load(Ordering::SeqCst) {
            info!(target: PROCESS_TARGET, peer = %connection.peer_addr(), "shutdown signal received");
            return;
        }
    }
}

pub(crate) fn connection_settings(config: &Config) -> ConnectionSettings {
    ConnectionSettings {
        poll_interval: config.poll_interval(),
        max_frame_bytes: config.max_frame_bytes(),
        request_timeout: config.request_timeout(),
    }
}
