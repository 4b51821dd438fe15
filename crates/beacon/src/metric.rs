//! Metric definitions as loaded from configuration, and the concrete probes
//! they expand into.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use derive_more::Display;

/// What a disk metric reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum DiskMeasure {
    #[default]
    #[display("percent_used")]
    PercentUsed,
    #[display("percent_free")]
    PercentFree,
    #[display("used_gb")]
    UsedGb,
    #[display("free_gb")]
    FreeGb,
    #[display("used_mb")]
    UsedMb,
    #[display("free_mb")]
    FreeMb,
}

impl DiskMeasure {
    pub(crate) fn parse(measure: &str) -> Option<Self> {
        match measure {
            "percent_used" => Some(Self::PercentUsed),
            "percent_free" => Some(Self::PercentFree),
            "used_gb" => Some(Self::UsedGb),
            "free_gb" => Some(Self::FreeGb),
            "used_mb" => Some(Self::UsedMb),
            "free_mb" => Some(Self::FreeMb),
            _ => None,
        }
    }
}

/// What a memory or swap metric reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum MemoryMeasure {
    #[default]
    #[display("percent")]
    Percent,
    #[display("free_gb")]
    FreeGb,
}

impl MemoryMeasure {
    pub(crate) fn parse(measure: &str) -> Option<Self> {
        match measure {
            "percent" => Some(Self::Percent),
            "free_gb" => Some(Self::FreeGb),
            _ => None,
        }
    }
}

/// Aggregate CPU load or one instance per logical core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum CpuMeasure {
    #[default]
    #[display("total")]
    Total,
    #[display("per_core")]
    PerCore,
}

impl CpuMeasure {
    pub(crate) fn parse(measure: &str) -> Option<Self> {
        match measure {
            "total" => Some(Self::Total),
            "per_core" => Some(Self::PerCore),
            _ => None,
        }
    }
}

/// Which network counter a rate metric follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum NetDirection {
    #[default]
    #[display("rx_mbps")]
    Rx,
    #[display("tx_mbps")]
    Tx,
}

impl NetDirection {
    pub(crate) fn parse(measure: &str) -> Option<Self> {
        match measure {
            "rx_mbps" => Some(Self::Rx),
            "tx_mbps" => Some(Self::Tx),
            _ => None,
        }
    }
}

/// A declared metric kind with its own typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    Disk { path: PathBuf, measure: DiskMeasure },
    /// One instance per eligible mounted filesystem, discovered at startup.
    DiskAuto { measure: DiskMeasure },
    Service { name: String },
    NetRate { direction: NetDirection },
    /// `CpuMeasure::PerCore` expands into one instance per logical core.
    Cpu(CpuMeasure),
    Memory(MemoryMeasure),
    Swap(MemoryMeasure),
    Load,
    Uptime,
}

/// Emission thresholds shared by every instance expanded from a definition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    /// Minimum absolute change that counts as worth reporting.
    pub diff: f64,
    /// Minimum time between two change-driven emissions.
    pub interval: Duration,
    /// Maximum silence before the current value is re-sent regardless.
    pub resend_interval: Duration,
}

impl fmt::Display for Thresholds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "diff={} interval={:?} resend={:?}",
            self.diff, self.interval, self.resend_interval
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub kind: MetricKind,
    pub thresholds: Thresholds,
}

/// The concrete measurement one metric instance takes every tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Disk { path: PathBuf, measure: DiskMeasure },
    Service { name: String },
    NetRate { direction: NetDirection },
    CpuTotal,
    CpuCore(usize),
    Memory(MemoryMeasure),
    Swap(MemoryMeasure),
    Load,
    Uptime,
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Disk { path, measure } => write!(f, "disk({}, {measure})", path.display()),
            Probe::Service { name } => write!(f, "service({name})"),
            Probe::NetRate { direction } => write!(f, "net_rate({direction})"),
            Probe::CpuTotal => write!(f, "cpu(total)"),
            Probe::CpuCore(index) => write!(f, "cpu(core {index})"),
            Probe::Memory(measure) => write!(f, "mem({measure})"),
            Probe::Swap(measure) => write!(f, "swap({measure})"),
            Probe::Load => write!(f, "load(5m)"),
            Probe::Uptime => write!(f, "uptime(hours)"),
        }
    }
}
