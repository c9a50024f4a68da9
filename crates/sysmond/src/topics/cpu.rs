//! Processor description and utilisation.

use std::collections::HashSet;
use std::fs;
use std::thread;
use std::time::Duration;

use nix::sys::utsname::uname;
use serde::Serialize;

use sysmon_protocol::HandlerError;

use super::round_to;

const CPUINFO_PATH: &str = "/proc/cpuinfo";
const STAT_PATH: &str = "/proc/stat";
const CPUFREQ_DIR: &str = "/sys/devices/system/cpu/cpu0/cpufreq";
/// Interval between the two `/proc/stat` samples used for utilisation.
const SAMPLE_WINDOW: Duration = Duration::from_millis(250);

/// Processor description with utilisation sampled over a short window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuSnapshot {
    /// Marketing name of the processor.
    pub name: String,
    /// Hardware architecture.
    pub architecture: String,
    /// Pointer width of the collector build.
    pub bits: u32,
    /// Distinct physical cores.
    pub physical_cores: usize,
    /// Logical processors.
    pub logical_cores: usize,
    /// Mean current clock across logical processors.
    pub current_frequency_mhz: Option<f64>,
    /// Lowest supported clock.
    pub min_frequency_mhz: Option<f64>,
    /// Highest supported clock.
    pub max_frequency_mhz: Option<f64>,
    /// Utilisation across all processors.
    pub usage_percent: f64,
    /// Utilisation per logical processor.
    pub cores_usage_percent: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct CpuInfo {
    name: String,
    physical_cores: usize,
    logical_cores: usize,
    current_frequency_mhz: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StatSample {
    aggregate: CpuTimes,
    cores: Vec<CpuTimes>,
}

pub(super) fn collect() -> Result<CpuSnapshot, HandlerError> {
    let info = parse_cpuinfo(&fs::read_to_string(CPUINFO_PATH)?);
    let architecture = uname()
        .map(|uts| uts.machine().to_string_lossy().into_owned())
        .map_err(|errno| HandlerError::from_error(&errno))?;

    let before = parse_stat(&fs::read_to_string(STAT_PATH)?)?;
    thread::sleep(SAMPLE_WINDOW);
    let after = parse_stat(&fs::read_to_string(STAT_PATH)?)?;

    Ok(CpuSnapshot {
        name: info.name,
        architecture,
        bits: usize::BITS,
        physical_cores: info.physical_cores,
        logical_cores: info.logical_cores,
        current_frequency_mhz: info.current_frequency_mhz,
        min_frequency_mhz: read_khz_as_mhz("cpuinfo_min_freq"),
        max_frequency_mhz: read_khz_as_mhz("cpuinfo_max_freq"),
        usage_percent: usage_between(before.aggregate, after.aggregate),
        cores_usage_percent: before
            .cores
            .iter()
            .zip(&after.cores)
            .map(|(first, second)| usage_between(*first, *second))
            .collect(),
    })
}

fn parse_cpuinfo(contents: &str) -> CpuInfo {
    let mut name = None;
    let mut logical_cores = 0;
    let mut cores = HashSet::new();
    let mut physical_id = None;
    let mut frequencies = Vec::new();

    for line in contents.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "processor" => logical_cores += 1,
            "model name" | "Hardware" if name.is_none() => name = Some(value.to_owned()),
            "physical id" => physical_id = Some(value.to_owned()),
            "core id" => {
                cores.insert((physical_id.clone(), value.to_owned()));
            }
            "cpu MHz" => frequencies.extend(value.parse::<f64>().ok()),
            _ => {}
        }
    }

    let logical_cores = if logical_cores == 0 {
        thread::available_parallelism().map_or(1, usize::from)
    } else {
        logical_cores
    };
    CpuInfo {
        name: name.unwrap_or_else(|| "unknown".to_owned()),
        physical_cores: if cores.is_empty() { logical_cores } else { cores.len() },
        logical_cores,
        current_frequency_mhz: mean(&frequencies).map(|mhz| round_to(mhz, 2)),
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "processor counts are far below f64 precision limits"
)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn parse_stat(contents: &str) -> Result<StatSample, HandlerError> {
    let mut sample = StatSample::default();
    let mut saw_aggregate = false;
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let Some(label) = fields.next().filter(|label| label.starts_with("cpu")) else {
            continue;
        };
        let counters: Vec<u64> = fields.filter_map(|field| field.parse().ok()).collect();
        let times = cpu_times(&counters)
            .ok_or_else(|| HandlerError::new(format!("malformed {label} line in {STAT_PATH}")))?;
        if label == "cpu" {
            sample.aggregate = times;
            saw_aggregate = true;
        } else {
            sample.cores.push(times);
        }
    }
    if saw_aggregate {
        Ok(sample)
    } else {
        Err(HandlerError::new(format!("{STAT_PATH} has no aggregate cpu line")))
    }
}

/// Folds `user nice system idle iowait irq softirq steal` into idle and total
/// jiffies. Guest time is already counted in `user` and `nice`.
fn cpu_times(counters: &[u64]) -> Option<CpuTimes> {
    let accounted = counters.get(..8).or_else(|| counters.get(..4))?;
    let idle = accounted.get(3).copied().unwrap_or_default()
        + accounted.get(4).copied().unwrap_or_default();
    Some(CpuTimes {
        idle,
        total: accounted.iter().sum(),
    })
}

fn usage_between(before: CpuTimes, after: CpuTimes) -> f64 {
    let total = after.total.saturating_sub(before.total);
    let idle = after.idle.saturating_sub(before.idle);
    super::percent(total.saturating_sub(idle), total)
}

fn read_khz_as_mhz(file: &str) -> Option<f64> {
    let raw = fs::read_to_string(format!("{CPUFREQ_DIR}/{file}")).ok()?;
    let khz: u32 = raw.trim().parse().ok()?;
    Some(round_to(f64::from(khz) / 1000.0, 2))
}
