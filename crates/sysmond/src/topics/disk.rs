//! Usage of the filesystem holding the working directory.

use nix::sys::statvfs::statvfs;
use serde::Serialize;

use sysmon_protocol::HandlerError;

use super::{gigabytes, percent};

/// Filesystem capacity in gigabytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskSnapshot {
    /// Total capacity.
    pub size_gb: f64,
    /// Space in use.
    pub used_gb: f64,
    /// Space available to unprivileged users.
    pub available_gb: f64,
    /// Share of capacity in use.
    pub used_percent: f64,
    /// Share of capacity available.
    pub available_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockCounts {
    fragment_size: u64,
    blocks: u64,
    free: u64,
    available: u64,
}

impl From<BlockCounts> for DiskSnapshot {
    fn from(counts: BlockCounts) -> Self {
        let bytes = |blocks: u64| blocks.saturating_mul(counts.fragment_size);
        let size = bytes(counts.blocks);
        let used = bytes(counts.blocks.saturating_sub(counts.free));
        let available = bytes(counts.available);
        Self {
            size_gb: gigabytes(size),
            used_gb: gigabytes(used),
            available_gb: gigabytes(available),
            used_percent: percent(used, size),
            available_percent: percent(available, size),
        }
    }
}

#[expect(
    clippy::useless_conversion,
    reason = "statvfs field widths differ between targets"
)]
pub(super) fn collect() -> Result<DiskSnapshot, HandlerError> {
    let stat = statvfs(".").map_err(|errno| HandlerError::from_error(&errno))?;
    Ok(DiskSnapshot::from(BlockCounts {
        fragment_size: u64::from(stat.fragment_size()),
        blocks: u64::from(stat.blocks()),
        free: u64::from(stat.blocks_free()),
        available: u64::from(stat.blocks_available()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_block_counts() {
        let snapshot = DiskSnapshot::from(BlockCounts {
            fragment_size: 4096,
            blocks: 262_144,
            free: 131_072,
            available: 65_536,
        });
        assert!((snapshot.size_gb - 1.0).abs() < f64::EPSILON);
        assert!((snapshot.used_gb - 0.5).abs() < f64::EPSILON);
        assert!((snapshot.available_gb - 0.25).abs() < f64::EPSILON);
        assert!((snapshot.used_percent - 50.0).abs() < f64::EPSILON);
        assert!((snapshot.available_percent - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_filesystem_reports_zero_percentages() {
        let snapshot = DiskSnapshot::from(BlockCounts {
            fragment_size: 4096,
            blocks: 0,
            free: 0,
            available: 0,
        });
        assert!(snapshot.used_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn reads_the_working_directory() {
        let snapshot = collect().expect("statvfs");
        assert!(snapshot.size_gb >= snapshot.available_gb);
    }
}
