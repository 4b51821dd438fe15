//! Turns a metric instance's probe into a value.

use std::sync::Arc;

use error_stack::Report;
use error_stack::ResultExt;
use thiserror::Error;
use tokio::time::Instant;

use crate::metric::DiskMeasure;
use crate::metric::MemoryMeasure;
use crate::metric::NetDirection;
use crate::metric::Probe;
use crate::platform::DiskUsage;
use crate::platform::MemoryStats;
use crate::platform::MetricSource;
use crate::platform::ServiceStatus;
use crate::platform::SourceError;
use crate::registry::MetricInstance;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Why an instance produced no value this tick.
///
/// Every variant has the same effect: the tick is skipped for that instance
/// and its emission state is left alone.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("measurement call failed")]
    Measurement,
    #[error("counter baseline recorded, rate available from the next sample")]
    RateNotReady,
    #[error("no time elapsed since the previous counter sample")]
    TimeSkew,
}

/// Dispatches probes to the measurement providers.
pub struct Sampler {
    source: Arc<dyn MetricSource>,
    services: Arc<dyn ServiceStatus>,
}

impl Sampler {
    pub fn new(source: Arc<dyn MetricSource>, services: Arc<dyn ServiceStatus>) -> Self {
        Self { source, services }
    }

    /// Take one measurement for `instance`.
    ///
    /// Only the instance's rate state is touched; emission state belongs to
    /// the caller.
    pub async fn sample(&self, instance: &mut MetricInstance) -> Result<f64, Report<SampleError>> {
        let reading = match &instance.probe {
            Probe::Service { name } => {
                let active = self.services.is_active(name).await;
                return Ok(if active { 1.0 } else { 0.0 });
            }
            Probe::NetRate { direction } => {
                let direction = *direction;
                let counters =
                    annotate(self.read(|source| source.net_counters()).await, &instance.probe)?;
                let counter = match direction {
                    NetDirection::Rx => counters.bytes_received,
                    NetDirection::Tx => counters.bytes_sent,
                };
                return instance.rate.observe(counter, Instant::now());
            }
            Probe::Disk { path, measure } => {
                let (path, measure) = (path.clone(), *measure);
                self.read(move |source| {
                    source
                        .disk_usage(&path)
                        .map(|usage| disk_value(&usage, measure))
                })
                .await
            }
            Probe::CpuTotal => self.read(|source| source.cpu_percent()).await,
            Probe::CpuCore(index) => {
                let index = *index;
                self.read(move |source| source.core_percent(index)).await
            }
            Probe::Memory(measure) => {
                let measure = *measure;
                self.read(move |source| {
                    source
                        .memory()
                        .map(|stats| memory_value(&stats, measure))
                })
                .await
            }
            Probe::Swap(measure) => {
                let measure = *measure;
                self.read(move |source| {
                    source
                        .swap()
                        .map(|stats| memory_value(&stats, measure))
                })
                .await
            }
            Probe::Load => self.read(|source| source.load_average().map(|load| load.five)).await,
            Probe::Uptime => {
                self.read(|source| {
                    source
                        .uptime()
                        .map(|uptime| uptime.as_secs_f64() / SECONDS_PER_HOUR)
                })
                .await
            }
        };
        annotate(reading, &instance.probe)
    }

    /// Run a provider call on the blocking pool.
    async fn read<T, F>(&self, read: F) -> Result<T, Report<SourceError>>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MetricSource) -> Result<T, Report<SourceError>> + Send + 'static,
    {
        let source = self.source.clone();
        match tokio::task::spawn_blocking(move || read(source.as_ref())).await {
            Ok(result) => result,
            Err(e) => Err(Report::new(SourceError::Interrupted).attach_printable(e.to_string())),
        }
    }
}

fn annotate<T>(
    result: Result<T, Report<SourceError>>,
    probe: &Probe,
) -> Result<T, Report<SampleError>> {
    result
        .change_context(SampleError::Measurement)
        .attach_printable_lazy(|| format!("probe: {probe}"))
}

fn disk_value(usage: &DiskUsage, measure: DiskMeasure) -> f64 {
    match measure {
        DiskMeasure::PercentUsed => usage.used_percent(),
        DiskMeasure::PercentFree => 100.0 - usage.used_percent(),
        DiskMeasure::UsedGb => usage.used as f64 / BYTES_PER_GB,
        DiskMeasure::FreeGb => usage.free as f64 / BYTES_PER_GB,
        DiskMeasure::UsedMb => usage.used as f64 / BYTES_PER_MB,
        DiskMeasure::FreeMb => usage.free as f64 / BYTES_PER_MB,
    }
}

fn memory_value(stats: &MemoryStats, measure: MemoryMeasure) -> f64 {
    match measure {
        MemoryMeasure::Percent => stats.used_percent(),
        MemoryMeasure::FreeGb => stats.free as f64 / BYTES_PER_GB,
    }
}
