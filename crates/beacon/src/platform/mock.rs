//! Test doubles for the measurement providers.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::thread::ThreadId;
use std::time::Duration;

use async_trait::async_trait;
use error_stack::Report;

use super::DiskUsage;
use super::LoadAverage;
use super::MemoryStats;
use super::MetricSource;
use super::Mount;
use super::NetCounters;
use super::ServiceStatus;
use super::SourceError;

#[derive(Default)]
struct MockState {
    mounts: Vec<Mount>,
    disks: HashMap<PathBuf, DiskUsage>,
    cores: Vec<f64>,
    cpu_total: f64,
    memory: MemoryStats,
    swap: MemoryStats,
    net: NetCounters,
    load: LoadAverage,
    uptime: Duration,
    fail_discovery: bool,
    fail_measurements: bool,
    last_reader: Option<ThreadId>,
}

/// Mock metric source with settable readings.
#[derive(Default)]
pub(crate) struct MockMetricSource {
    state: Mutex<MockState>,
}

impl MockMetricSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_mount(&self, mount_point: &str, device: &str, fs_type: &str, usage: DiskUsage) {
        let mut state = self.state.lock().unwrap();
        state.mounts.push(Mount {
            mount_point: PathBuf::from(mount_point),
            device: device.to_string(),
            fs_type: fs_type.to_string(),
        });
        state.disks.insert(PathBuf::from(mount_point), usage);
    }

    pub(crate) fn set_cores(&self, cores: Vec<f64>) {
        let mut state = self.state.lock().unwrap();
        state.cpu_total = if cores.is_empty() {
            0.0
        } else {
            cores.iter().sum::<f64>() / cores.len() as f64
        };
        state.cores = cores;
    }

    pub(crate) fn set_memory(&self, memory: MemoryStats) {
        self.state.lock().unwrap().memory = memory;
    }

    pub(crate) fn set_swap(&self, swap: MemoryStats) {
        self.state.lock().unwrap().swap = swap;
    }

    pub(crate) fn set_net(&self, bytes_received: u64, bytes_sent: u64) {
        self.state.lock().unwrap().net = NetCounters {
            bytes_received,
            bytes_sent,
        };
    }

    pub(crate) fn set_load(&self, load: LoadAverage) {
        self.state.lock().unwrap().load = load;
    }

    pub(crate) fn set_uptime(&self, uptime: Duration) {
        self.state.lock().unwrap().uptime = uptime;
    }

    /// Make mount enumeration and core counting fail.
    pub(crate) fn set_discovery_failure(&self, enabled: bool) {
        self.state.lock().unwrap().fail_discovery = enabled;
    }

    /// Make every measurement call fail.
    pub(crate) fn set_measurement_failure(&self, enabled: bool) {
        self.state.lock().unwrap().fail_measurements = enabled;
    }

    /// Thread that served the latest measurement call.
    pub(crate) fn last_reader(&self) -> Option<ThreadId> {
        self.state.lock().unwrap().last_reader
    }

    fn read<T>(&self, what: &'static str, read: impl FnOnce(&MockState) -> T) -> Result<T, Report<SourceError>> {
        let mut state = self.state.lock().unwrap();
        state.last_reader = Some(std::thread::current().id());
        if state.fail_measurements {
            return Err(Report::new(SourceError::Unavailable(what)));
        }
        Ok(read(&state))
    }
}

impl MetricSource for MockMetricSource {
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, Report<SourceError>> {
        self.read("disk", |state| state.disks.get(path).copied())?
            .ok_or_else(|| Report::new(SourceError::NoMount(path.to_path_buf())))
    }

    fn mounts(&self) -> Result<Vec<Mount>, Report<SourceError>> {
        let state = self.state.lock().unwrap();
        if state.fail_discovery {
            return Err(Report::new(SourceError::Unavailable("mount table")));
        }
        Ok(state.mounts.clone())
    }

    fn core_count(&self) -> Result<usize, Report<SourceError>> {
        let state = self.state.lock().unwrap();
        if state.fail_discovery {
            return Err(Report::new(SourceError::NoCpus));
        }
        Ok(state.cores.len())
    }

    fn cpu_percent(&self) -> Result<f64, Report<SourceError>> {
        self.read("cpu", |state| state.cpu_total)
    }

    fn core_percent(&self, index: usize) -> Result<f64, Report<SourceError>> {
        self.read("cpu", |state| state.cores.get(index).copied().ok_or(state.cores.len()))?
            .map_err(|count| Report::new(SourceError::UnknownCore { index, count }))
    }

    fn memory(&self) -> Result<MemoryStats, Report<SourceError>> {
        self.read("memory", |state| state.memory)
    }

    fn swap(&self) -> Result<MemoryStats, Report<SourceError>> {
        self.read("swap", |state| state.swap)
    }

    fn net_counters(&self) -> Result<NetCounters, Report<SourceError>> {
        self.read("network", |state| state.net)
    }

    fn load_average(&self) -> Result<LoadAverage, Report<SourceError>> {
        self.read("load average", |state| state.load)
    }

    fn uptime(&self) -> Result<Duration, Report<SourceError>> {
        self.read("uptime", |state| state.uptime)
    }
}

/// Mock service status provider.
///
/// Optionally takes `delay` to answer, which lets tests stall one worker for
/// longer than a tick. Tracks how many checks run at once.
#[derive(Default)]
pub(crate) struct MockServiceStatus {
    active: Mutex<HashSet<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl MockServiceStatus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub(crate) fn set_active(&self, service: &str, active: bool) {
        let mut services = self.active.lock().unwrap();
        if active {
            services.insert(service.to_string());
        } else {
            services.remove(service);
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceStatus for MockServiceStatus {
    async fn is_active(&self, service: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.active.lock().unwrap().contains(service)
    }
}
