//! Test support for CLI runtime coverage.
//!
//! Supplies an in-process collector speaking the real protocol, a static
//! configuration loader, and a world that captures the CLI's streams so step
//! definitions and unit tests stay focused on their assertions.

use std::cell::RefCell;
use std::ffi::OsString;
use std::io::{Cursor, ErrorKind};
use std::net::TcpListener;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use rstest::fixture;
use serde_json::{Value, json};

use sysmon_config::Config;
use sysmon_protocol::{
    Connection, ConnectionSettings, HandlerError, InboundHandler, RequestRouter, WorkerPool,
};

use crate::{AppError, ConfigLoader, IoStreams, run_with_loader};

const POLL: Duration = Duration::from_millis(5);
const LIFETIME: Duration = Duration::from_secs(10);

pub(super) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(super) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Configuration pointing at a loopback collector on `port`.
pub(super) fn loopback_config(port: Option<u16>) -> Config {
    Config {
        host: String::from("127.0.0.1"),
        port,
        poll_interval_ms: 2,
        request_timeout_ms: 5_000,
        ..Config::default()
    }
}

/// A collector serving canned topics over one loopback connection.
///
/// `cpu` reports the running request count as its usage, `disk` always fails
/// and `network` is not registered.
pub(super) struct FakeCollector {
    pub(super) port: u16,
    served: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeCollector {
    pub(super) fn spawn() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake collector")?;
        listener
            .set_nonblocking(true)
            .context("configure fake collector listener")?;
        let port = listener.local_addr().context("fake collector address")?.port();
        let served = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let router: Arc<dyn InboundHandler> = Arc::new(Self::router(&served)?);

        let loop_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || serve_one(&listener, router, &loop_stop));
        Ok(Self {
            port,
            served,
            stop,
            handle: Some(handle),
        })
    }

    fn router(served: &Arc<AtomicUsize>) -> Result<RequestRouter> {
        let pool = WorkerPool::new(2, 8).map_err(|error| anyhow!("start worker pool: {error}"))?;
        let mut router = RequestRouter::new(pool);
        register(&mut router, served, "system", |_| {
            Ok(json!({
                "name": "testhost",
                "system": "Linux",
                "platform": "Linux-6.1.0-x86_64",
                "release": "6.1.0",
                "version": "#1 SMP",
                "machine": "x86_64",
            }))
        });
        register(&mut router, served, "cpu", |count| {
            Ok(json!({"name": "Example CPU", "usage_percent": count}))
        });
        register(&mut router, served, "ram", |_| {
            Ok(json!({
                "total_gb": 8.0,
                "used_gb": 6.0,
                "available_gb": 2.0,
                "percent_usage": 75.0,
                "percent_available": 25.0,
            }))
        });
        register(&mut router, served, "processes", |_| {
            Ok(json!([
                {"pid": 42, "name": "sysmond", "state": "sleeping", "used_threads": 5,
                 "used_memory_mb": 10.5, "memory_use_percent": 0.1,
                 "user_cpu_seconds": 2.5, "started_at": 1_700_000_090},
            ]))
        });
        register(&mut router, served, "disk", |_| {
            Err(HandlerError::new("statvfs failed"))
        });
        Ok(router)
    }

    /// Stops serving and returns how many requests reached a handler.
    pub(super) fn finish(&mut self) -> usize {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
        self.served.load(Ordering::SeqCst)
    }
}

impl Drop for FakeCollector {
    fn drop(&mut self) {
        self.finish();
    }
}

fn register(
    router: &mut RequestRouter,
    served: &Arc<AtomicUsize>,
    topic: &str,
    value: fn(usize) -> Result<Value, HandlerError>,
) {
    let served = Arc::clone(served);
    router.register_topic(topic, move || value(served.fetch_add(1, Ordering::SeqCst) + 1));
}

fn serve_one(listener: &TcpListener, router: Arc<dyn InboundHandler>, stop: &AtomicBool) {
    let deadline = Instant::now() + LIFETIME;
    let stream = loop {
        if stop.load(Ordering::SeqCst) || Instant::now() >= deadline {
            return;
        }
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(error) if error.kind() == ErrorKind::WouldBlock => thread::sleep(POLL),
            Err(_) => return,
        }
    };

    let settings = ConnectionSettings {
        poll_interval: Duration::from_millis(2),
        ..ConnectionSettings::default()
    };
    let Ok(connection) = Connection::spawn(stream, router, &settings) else {
        return;
    };
    while !connection.wait_closed(POLL)
        && !stop.load(Ordering::SeqCst)
        && Instant::now() < deadline
    {}
    connection.close().ok();
}

#[derive(Default)]
pub(super) struct TestWorld {
    pub(super) config: Config,
    pub(super) collector: Option<FakeCollector>,
    pub(super) stdin: Vec<u8>,
    pub(super) stdout: Vec<u8>,
    pub(super) stderr: Vec<u8>,
    pub(super) exit_code: Option<ExitCode>,
}

impl TestWorld {
    pub(super) fn start_collector(&mut self) -> Result<()> {
        let collector = FakeCollector::spawn()?;
        self.config = loopback_config(Some(collector.port));
        self.collector = Some(collector);
        Ok(())
    }

    /// Starts a collector but leaves the port for the operator to type.
    pub(super) fn start_unconfigured_collector(&mut self) -> Result<()> {
        self.start_collector()?;
        let port = self.collector_port()?;
        self.config.port = None;
        self.stdin = format!("{port}\n").into_bytes();
        Ok(())
    }

    /// Points the configuration at a loopback port nothing listens on.
    pub(super) fn configure_unreachable_collector(&mut self) -> Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("reserve port")?;
        let port = listener.local_addr().context("reserved address")?.port();
        drop(listener);
        self.config = loopback_config(Some(port));
        Ok(())
    }

    pub(super) fn collector_port(&self) -> Result<u16> {
        self.collector
            .as_ref()
            .map(|collector| collector.port)
            .ok_or_else(|| anyhow!("no collector running"))
    }

    pub(super) fn run(&mut self, command: &str) {
        self.stdout.clear();
        self.stderr.clear();
        let args = Self::build_args(command);
        let loader = StaticConfigLoader::new(self.config.clone());
        let mut stdin = Cursor::new(self.stdin.clone());
        let mut io = IoStreams::new(&mut stdin, &mut self.stdout, &mut self.stderr, false);
        let exit = run_with_loader(args, &mut io, &loader);
        self.exit_code = Some(exit);
    }

    fn build_args(command: &str) -> Vec<OsString> {
        let mut args = vec![OsString::from("sysmon")];
        args.extend(command.split_whitespace().map(OsString::from));
        args
    }

    /// Stops the collector and returns how many requests it served.
    pub(super) fn served(&mut self) -> usize {
        self.collector.as_mut().map_or(0, FakeCollector::finish)
    }

    pub(super) fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub(super) fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub(super) fn json_lines(&self) -> Result<Vec<Value>> {
        self.stdout_text()
            .lines()
            .map(|line| serde_json::from_str(line).with_context(|| format!("parse {line:?}")))
            .collect()
    }

    pub(super) fn assert_success(&self) {
        assert_eq!(
            self.exit_code,
            Some(ExitCode::SUCCESS),
            "stderr: {}",
            self.stderr_text()
        );
    }

    pub(super) fn assert_failure(&self) {
        assert_eq!(self.exit_code, Some(ExitCode::FAILURE));
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
