//! Physical memory usage.

use std::fs;

use serde::Serialize;

use sysmon_protocol::HandlerError;

use super::{gigabytes, percent};

const MEMINFO_PATH: &str = "/proc/meminfo";

/// Physical memory totals in gigabytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RamSnapshot {
    /// Installed memory.
    pub total_gb: f64,
    /// Memory available to new allocations without swapping.
    pub available_gb: f64,
    /// Memory in use.
    pub used_gb: f64,
    /// Share of memory in use.
    pub percent_usage: f64,
    /// Share of memory still available.
    pub percent_available: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct MemoryTotals {
    pub(super) total: u64,
    pub(super) available: u64,
}

impl MemoryTotals {
    pub(super) fn read() -> Result<Self, HandlerError> {
        parse_meminfo(&fs::read_to_string(MEMINFO_PATH)?)
    }
}

impl From<MemoryTotals> for RamSnapshot {
    fn from(totals: MemoryTotals) -> Self {
        let used = totals.total.saturating_sub(totals.available);
        Self {
            total_gb: gigabytes(totals.total),
            available_gb: gigabytes(totals.available),
            used_gb: gigabytes(used),
            percent_usage: percent(used, totals.total),
            percent_available: percent(totals.available, totals.total),
        }
    }
}

pub(super) fn collect() -> Result<RamSnapshot, HandlerError> {
    MemoryTotals::read().map(RamSnapshot::from)
}

/// Reads `MemTotal` and `MemAvailable`, falling back to `MemFree` on kernels
/// that predate the latter.
fn parse_meminfo(contents: &str) -> Result<MemoryTotals, HandlerError> {
    let mut total = None;
    let mut available = None;
    let mut free = None;
    for line in contents.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key {
            "MemTotal" => &mut total,
            "MemAvailable" => &mut available,
            "MemFree" => &mut free,
            _ => continue,
        };
        *slot = parse_kib(value);
    }
    let total =
        total.ok_or_else(|| HandlerError::new(format!("{MEMINFO_PATH} has no MemTotal entry")))?;
    let available = available
        .or(free)
        .ok_or_else(|| HandlerError::new(format!("{MEMINFO_PATH} has no MemAvailable entry")))?;
    Ok(MemoryTotals { total, available })
}

fn parse_kib(value: &str) -> Option<u64> {
    let kib: u64 = value.trim().trim_end_matches("kB").trim().parse().ok()?;
    kib.checked_mul(1024)
}
