//! OS measurement providers.
//!
//! The sampling core only talks to [`MetricSource`] and [`ServiceStatus`];
//! [`host::SysinfoSource`] and [`service::SystemctlStatus`] are the production
//! implementations.

pub mod host;
#[cfg(test)]
pub(crate) mod mock;
pub mod service;

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use error_stack::Report;
use thiserror::Error;

pub use host::SysinfoSource;
pub use service::ServiceStatus;
pub use service::SystemctlStatus;

/// A mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub mount_point: PathBuf,
    /// Device path, e.g. `/dev/nvme0n1p2`.
    pub device: String,
    pub fs_type: String,
}

/// Space accounting for one filesystem, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    pub fn used_percent(&self) -> f64 {
        percent(self.used, self.total)
    }
}

/// Physical memory or swap accounting, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl MemoryStats {
    pub fn used_percent(&self) -> f64 {
        percent(self.used, self.total)
    }
}

/// Cumulative byte counters summed across all interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no mounted filesystem contains {}", .0.display())]
    NoMount(PathBuf),
    #[error("failed to read filesystem statistics for {}", .0.display())]
    Statvfs(PathBuf),
    #[error("core {index} is not reported, host has {count} cores")]
    UnknownCore { index: usize, count: usize },
    #[error("no CPUs reported")]
    NoCpus,
    #[error("{0} is unavailable on this host")]
    Unavailable(&'static str),
    #[error("measurement task did not complete")]
    Interrupted,
}

/// Raw OS measurements.
///
/// Implementations are shared between all metric workers and must be cheap to
/// call concurrently.
pub trait MetricSource: Send + Sync {
    /// Usage of the filesystem that contains `path`.
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, Report<SourceError>>;

    /// Every mounted filesystem, eligible for monitoring or not.
    fn mounts(&self) -> Result<Vec<Mount>, Report<SourceError>>;

    /// Number of logical CPU cores.
    fn core_count(&self) -> Result<usize, Report<SourceError>>;

    /// Aggregate CPU load in percent.
    fn cpu_percent(&self) -> Result<f64, Report<SourceError>>;

    /// CPU load in percent of one logical core.
    fn core_percent(&self, index: usize) -> Result<f64, Report<SourceError>>;

    fn memory(&self) -> Result<MemoryStats, Report<SourceError>>;

    fn swap(&self) -> Result<MemoryStats, Report<SourceError>>;

    fn net_counters(&self) -> Result<NetCounters, Report<SourceError>>;

    fn load_average(&self) -> Result<LoadAverage, Report<SourceError>>;

    fn uptime(&self) -> Result<Duration, Report<SourceError>>;
}
