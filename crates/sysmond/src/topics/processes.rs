//! Process table, newest process first.

use std::fs;
use std::path::Path;

use nix::unistd::{SysconfVar, sysconf};
use serde::Serialize;
use tracing::trace;

use sysmon_protocol::HandlerError;

use super::ram::MemoryTotals;
use super::{TOPICS_TARGET, megabytes, percent, round_to};

const PROC_ROOT: &str = "/proc";
const KERNEL_STAT_PATH: &str = "/proc/stat";
/// Tick rate assumed when `sysconf` cannot report one.
const FALLBACK_TICKS_PER_SECOND: u64 = 100;

/// One entry of the process table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    /// Process identifier.
    pub pid: u32,
    /// Command name.
    pub name: String,
    /// Resident set size in megabytes.
    pub used_memory_mb: f64,
    /// Resident set size as a share of physical memory.
    pub memory_use_percent: f64,
    /// Thread count.
    pub used_threads: u32,
    /// Scheduler state, for example `sleeping`.
    pub state: String,
    /// Start time in seconds since the Unix epoch.
    pub started_at: u64,
    /// CPU time spent in user mode, in seconds.
    pub user_cpu_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProcessStatus {
    name: String,
    state: String,
    threads: u32,
    resident_bytes: u64,
}

/// Clock counters from `/proc/<pid>/stat`, in kernel ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProcessTimes {
    user_ticks: u64,
    start_ticks: u64,
}

/// Host-wide facts every snapshot is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HostClock {
    total_memory: u64,
    boot_time: u64,
    ticks_per_second: u64,
}

impl HostClock {
    fn read() -> Result<Self, HandlerError> {
        let stat = fs::read_to_string(KERNEL_STAT_PATH)?;
        let boot_time = parse_boot_time(&stat)
            .ok_or_else(|| HandlerError::new(format!("{KERNEL_STAT_PATH} has no btime line")))?;
        Ok(Self {
            total_memory: MemoryTotals::read()?.total,
            boot_time,
            ticks_per_second: ticks_per_second(),
        })
    }

    fn started_at(self, times: ProcessTimes) -> u64 {
        self.boot_time
            .saturating_add(times.start_ticks / self.ticks_per_second)
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "tick counts are reported as rounded seconds"
    )]
    fn seconds(self, ticks: u64) -> f64 {
        round_to(ticks as f64 / self.ticks_per_second as f64, 2)
    }
}

impl ProcessSnapshot {
    fn new(pid: u32, status: ProcessStatus, times: ProcessTimes, host: HostClock) -> Self {
        Self {
            pid,
            name: status.name,
            used_memory_mb: megabytes(status.resident_bytes),
            memory_use_percent: percent(status.resident_bytes, host.total_memory),
            used_threads: status.threads,
            state: status.state,
            started_at: host.started_at(times),
            user_cpu_seconds: host.seconds(times.user_ticks),
        }
    }
}

pub(super) fn collect() -> Result<Vec<ProcessSnapshot>, HandlerError> {
    let host = HostClock::read()?;
    let mut processes = Vec::new();
    for entry in fs::read_dir(PROC_ROOT)? {
        let entry = entry?;
        let Some(pid) = entry.file_name().to_str().and_then(|name| name.parse().ok()) else {
            continue;
        };
        match read_process(&entry.path()) {
            Some((status, times)) => {
                processes.push(ProcessSnapshot::new(pid, status, times, host));
            }
            None => trace!(target: TOPICS_TARGET, pid, "process vanished while listing"),
        }
    }
    sort_newest_first(&mut processes);
    Ok(processes)
}

fn read_process(dir: &Path) -> Option<(ProcessStatus, ProcessTimes)> {
    let status = parse_status(&fs::read_to_string(dir.join("status")).ok()?)?;
    let times = parse_stat_times(&fs::read_to_string(dir.join("stat")).ok()?)?;
    Some((status, times))
}

fn ticks_per_second() -> u64 {
    sysconf(SysconfVar::CLK_TCK)
        .ok()
        .flatten()
        .and_then(|ticks| u64::try_from(ticks).ok())
        .filter(|ticks| *ticks > 0)
        .unwrap_or(FALLBACK_TICKS_PER_SECOND)
}

/// Reads the boot time, in seconds since the epoch, from `/proc/stat`.
fn parse_boot_time(contents: &str) -> Option<u64> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix("btime"))
        .and_then(|value| value.trim().parse().ok())
}

/// Parses `utime` (field 14) and `starttime` (field 22) of
/// `/proc/<pid>/stat`. Fields are counted after the parenthesised command
/// name, which may itself contain spaces or parentheses.
fn parse_stat_times(contents: &str) -> Option<ProcessTimes> {
    let (_, after_name) = contents.rsplit_once(')')?;
    let fields: Vec<&str> = after_name.split_whitespace().collect();
    // `fields[0]` is field 3, the state letter.
    Some(ProcessTimes {
        user_ticks: fields.get(11)?.parse().ok()?,
        start_ticks: fields.get(19)?.parse().ok()?,
    })
}

fn sort_newest_first(processes: &mut [ProcessSnapshot]) {
    processes.sort_unstable_by(|left, right| right.pid.cmp(&left.pid));
}

/// Parses `/proc/<pid>/status`. Kernel threads carry no `VmRSS` line and
/// report zero resident memory.
fn parse_status(contents: &str) -> Option<ProcessStatus> {
    let mut name = None;
    let mut state = None;
    let mut threads = None;
    let mut resident_bytes = 0;
    for line in contents.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => name = Some(value.to_owned()),
            "State" => state = Some(state_name(value)),
            "Threads" => threads = value.parse().ok(),
            "VmRSS" => {
                resident_bytes = value
                    .trim_end_matches("kB")
                    .trim()
                    .parse::<u64>()
                    .ok()?
                    .saturating_mul(1024);
            }
            _ => {}
        }
    }
    Some(ProcessStatus {
        name: name?,
        state: state?,
        threads: threads?,
        resident_bytes,
    })
}

/// Turns `S (sleeping)` into `sleeping`, falling back to the state letter.
fn state_name(value: &str) -> String {
    value
        .split_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .unwrap_or(value)
        .replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const STATUS: &str = "\
Name:\tsysmond
Umask:\t0022
State:\tS (sleeping)
Pid:\t4242
VmRSS:\t   10240 kB
Threads:\t5
";

    const STAT: &str = "4242 (sys mon) d) S 1 4242 4242 0 -1 4194560 1200 0 0 0 \
250 40 0 0 20 0 5 0 9000 123456789 2560 18446744073709551615";

    const HOST: HostClock = HostClock {
        total_memory: 40 * 1024 * 1024,
        boot_time: 1_700_000_000,
        ticks_per_second: 100,
    };

    fn times() -> ProcessTimes {
        parse_stat_times(STAT).expect("stat times")
    }

    #[test]
    fn parses_status_file() {
        let status = parse_status(STATUS).expect("status");
        assert_eq!(
            status,
            ProcessStatus {
                name: "sysmond".to_owned(),
                state: "sleeping".to_owned(),
                threads: 5,
                resident_bytes: 10 * 1024 * 1024,
            }
        );
    }

    #[test]
    fn kernel_threads_report_no_memory() {
        let status =
            parse_status("Name:\tkthreadd\nState:\tI (idle)\nThreads:\t1\n").expect("status");
        assert_eq!(status.resident_bytes, 0);
        assert_eq!(status.state, "idle");
    }

    #[rstest]
    #[case("R (running)", "running")]
    #[case("D (disk sleep)", "disk-sleep")]
    #[case("t (tracing stop)", "tracing-stop")]
    #[case("Z", "Z")]
    fn names_states(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(state_name(raw), expected);
    }

    #[test]
    fn derives_memory_share() {
        let status = parse_status(STATUS).expect("status");
        let snapshot = ProcessSnapshot::new(4242, status, times(), HOST);
        assert!((snapshot.used_memory_mb - 10.0).abs() < f64::EPSILON);
        assert!((snapshot.memory_use_percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reads_times_after_the_command_name() {
        assert_eq!(
            times(),
            ProcessTimes {
                user_ticks: 250,
                start_ticks: 9000,
            }
        );
    }

    #[rstest]
    #[case("")]
    #[case("4242 (sysmond")]
    #[case("4242 (sysmond) S 1 4242")]
    #[case("4242 (sysmond) S 1 4242 4242 0 -1 4194560 1200 0 0 0 x 40 0 0 20 0 5 0 9000")]
    fn rejects_truncated_stat_lines(#[case] contents: &str) {
        assert_eq!(parse_stat_times(contents), None);
    }

    #[test]
    fn derives_start_and_cpu_time() {
        let status = parse_status(STATUS).expect("status");
        let snapshot = ProcessSnapshot::new(4242, status, times(), HOST);
        assert_eq!(snapshot.started_at, 1_700_000_090);
        assert!((snapshot.user_cpu_seconds - 2.5).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case("cpu  1 2 3 4\nbtime 1700000000\nprocesses 12\n", Some(1_700_000_000))]
    #[case("cpu  1 2 3 4\nprocesses 12\n", None)]
    fn finds_boot_time(#[case] contents: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_boot_time(contents), expected);
    }

    #[test]
    fn orders_newest_first() {
        let status = parse_status(STATUS).expect("status");
        let mut processes: Vec<_> = [3, 10, 7]
            .into_iter()
            .map(|pid| ProcessSnapshot::new(pid, status.clone(), times(), HOST))
            .collect();
        sort_newest_first(&mut processes);
        let pids: Vec<_> = processes.iter().map(|process| process.pid).collect();
        assert_eq!(pids, [10, 7, 3]);
    }

    #[test]
    fn lists_the_current_process() {
        let processes = collect().expect("process table");
        let current = processes
            .iter()
            .find(|process| process.pid == std::process::id())
            .expect("current process listed");
        assert!(current.started_at > 0);
    }
}
