//! CLI argument definitions for the sysmon dashboard.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::output::OutputFormat;

/// Dataset requested from the collector.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Topic {
    /// Host and kernel identification.
    System,
    /// Processor description and utilisation.
    Cpu,
    /// Physical memory usage.
    Ram,
    /// Usage of the collector's working filesystem.
    Disk,
    /// IPv4 interface addresses.
    Network,
    /// Process table, newest first.
    Processes,
}

impl Topic {
    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Cpu => "cpu",
            Self::Ram => "ram",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Processes => "processes",
        }
    }
}

/// Command-line interface for the sysmon dashboard.
#[derive(Parser, Debug)]
#[command(name = "sysmon", about = "Fetches host metrics from a sysmond collector")]
pub(crate) struct Cli {
    /// Topic to request.
    #[arg(value_enum, value_name = "TOPIC")]
    pub(crate) topic: Topic,
    /// Re-requests the topic on an interval instead of fetching once.
    #[arg(long)]
    pub(crate) watch: bool,
    /// Seconds between requests in watch mode.
    #[arg(long, value_name = "SECONDS", default_value_t = 2, requires = "watch")]
    pub(crate) interval_secs: u64,
    /// Stops watch mode after this many results.
    #[arg(long, value_name = "N", requires = "watch")]
    pub(crate) count: Option<u64>,
    /// Controls how results are rendered.
    #[arg(long, value_enum, default_value_t = OutputFormat::Auto)]
    pub(crate) output: OutputFormat,
}

impl Cli {
    /// Pause between watch requests.
    pub(crate) const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
