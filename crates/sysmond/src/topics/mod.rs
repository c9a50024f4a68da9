//! Host metric collectors served as protocol topics.
//!
//! Each collector returns a serialisable snapshot; [`register_all`] installs
//! them on a [`RequestRouter`] under their topic names. Collectors read
//! `/proc` and use `nix` for the system calls std does not wrap, so they are
//! Linux-first: on other platforms the affected topics answer with a handler
//! error.

mod cpu;
mod disk;
mod network;
mod processes;
mod ram;
mod system;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use sysmon_protocol::{HandlerError, RequestRouter};

pub use cpu::CpuSnapshot;
pub use disk::DiskSnapshot;
pub use network::{InterfaceAddress, NetworkSnapshot};
pub use processes::ProcessSnapshot;
pub use ram::RamSnapshot;
pub use system::SystemSnapshot;

const TOPICS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::topics");

/// Names of every topic the collector serves.
pub const TOPICS: [&str; 6] = ["system", "cpu", "ram", "disk", "network", "processes"];

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Installs every collector on `router`.
pub fn register_all(router: &mut RequestRouter) {
    router.register_topic("system", || to_value(&system::collect()?));
    router.register_topic("cpu", || to_value(&cpu::collect()?));
    router.register_topic("ram", || to_value(&ram::collect()?));
    router.register_topic("disk", || to_value(&disk::collect()?));
    router.register_topic("network", || to_value(&network::collect()?));
    router.register_topic("processes", || to_value(&processes::collect()?));
    debug!(target: TOPICS_TARGET, topics = ?TOPICS, "collectors registered");
}

fn to_value<T: Serialize>(snapshot: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(snapshot).map_err(|error| HandlerError::from_error(&error))
}

#[expect(
    clippy::cast_precision_loss,
    reason = "byte counts are reported as rounded gigabytes"
)]
fn gigabytes(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_GB, 2)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "byte counts are reported as rounded megabytes"
)]
fn megabytes(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_MB, 2)
}

/// Share of `part` in `whole` as a percentage with one decimal.
#[expect(
    clippy::cast_precision_loss,
    reason = "percentages are reported with one decimal"
)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 * 100.0 / whole as f64, 1)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round() / scale
}
