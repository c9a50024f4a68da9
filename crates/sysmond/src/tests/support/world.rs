//! BDD test world: encapsulates loader, reporter, bootstrap state, and a
//! running collector for step functions.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::Value;

use sysmon_protocol::{Client, ConnectionSettings, RequestError};

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};
use crate::process::LaunchError;
use crate::process::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::process::{ManualShutdown, ScriptedPrompt};
use super::reporter::RecordingHealthReporter;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Collector running `run_daemon_with` on a background thread.
pub struct CollectorRun {
    pub reporter: Arc<RecordingHealthReporter>,
    pub shutdown: ManualShutdown,
    handle: JoinHandle<Result<(), LaunchError>>,
}

impl CollectorRun {
    /// Launches a collector with the given loader and prompt.
    #[must_use]
    pub fn start(loader: TestConfigLoader, prompt: ScriptedPrompt) -> Self {
        let reporter = Arc::new(RecordingHealthReporter::default());
        let shutdown = ManualShutdown::default();
        let plan = LaunchPlan {
            process: ProcessControl {
                shutdown: shutdown.clone(),
                prompt,
            },
            services: ServiceDeps {
                loader,
                reporter: reporter.clone(),
            },
        };
        let handle = thread::spawn(move || run_daemon_with(plan));
        Self {
            reporter,
            shutdown,
            handle,
        }
    }

    /// Address the collector bound to.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.reporter
            .bound_addr(STARTUP_TIMEOUT)
            .expect("collector did not start listening")
    }

    /// Waits for the launch thread to return its outcome.
    pub fn finish(self) -> Result<(), LaunchError> {
        let deadline = Instant::now() + STARTUP_TIMEOUT;
        while !self.handle.is_finished() {
            assert!(Instant::now() < deadline, "collector did not stop in time");
            thread::sleep(Duration::from_millis(5));
        }
        self.handle.join().expect("collector thread panicked")
    }
}

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    bootstrap_error: Option<BootstrapError>,
    collector: Option<CollectorRun>,
    client: Option<Client>,
    reply: Option<Result<Value, RequestError>>,
    outcome: Option<Result<(), LaunchError>>,
    finished_reporter: Option<Arc<RecordingHealthReporter>>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::ephemeral()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            bootstrap_error: None,
            collector: None,
            client: None,
            reply: None,
            outcome: None,
            finished_reporter: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::ephemeral());
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.daemon.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(&*self.loader, self.reporter.as_ref()) {
            Ok(daemon) => self.daemon = Some(daemon),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns whether bootstrap produced an error.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns true when the daemon handle is available.
    #[must_use]
    pub fn daemon_started(&self) -> bool {
        self.daemon.is_some()
    }

    /// Launches a collector on an ephemeral loopback port.
    pub fn start_collector(&mut self) {
        self.collector = Some(CollectorRun::start(
            TestConfigLoader::ephemeral(),
            ScriptedPrompt::silent(),
        ));
    }

    /// Connects a dashboard client to the running collector.
    pub fn connect_dashboard(&mut self) {
        let collector = self.collector.as_ref().expect("collector not started");
        let client = Client::connect(collector.addr(), &ConnectionSettings::default())
            .expect("dashboard connect");
        self.client = Some(client);
    }

    /// Issues a blocking request from the dashboard.
    pub fn request(&mut self, topic: &str) {
        let client = self.client.as_ref().expect("dashboard not connected");
        self.reply = Some(client.request_blocking(topic));
    }

    /// Last reply received by the dashboard.
    #[must_use]
    pub fn reply(&self) -> Option<&Result<Value, RequestError>> {
        self.reply.as_ref()
    }

    /// Closes the dashboard side of the connection.
    pub fn disconnect_dashboard(&mut self) {
        if let Some(client) = self.client.take() {
            client.close().expect("dashboard close");
        }
    }

    /// Raises the collector's shutdown flag.
    pub fn signal_shutdown(&self) {
        self.collector
            .as_ref()
            .expect("collector not started")
            .shutdown
            .trigger();
    }

    /// Waits for the collector to return.
    pub fn await_collector(&mut self) {
        let collector = self.collector.take().expect("collector not started");
        self.finished_reporter = Some(Arc::clone(&collector.reporter));
        self.outcome = Some(collector.finish());
    }

    /// Outcome of the finished collector.
    #[must_use]
    pub fn outcome(&self) -> Option<&Result<(), LaunchError>> {
        self.outcome.as_ref()
    }

    /// Reporter of the finished collector.
    #[must_use]
    pub fn collector_reporter(&self) -> Arc<RecordingHealthReporter> {
        self.finished_reporter
            .clone()
            .or_else(|| self.collector.as_ref().map(|run| Arc::clone(&run.reporter)))
            .expect("collector not started")
    }

    fn reset_results(&mut self) {
        self.daemon = None;
        self.bootstrap_error = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
