//! [`MetricSource`] backed by the `sysinfo` crate.

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use error_stack::Report;
use error_stack::ResultExt;
use sysinfo::CpuRefreshKind;
use sysinfo::Disks;
use sysinfo::MemoryRefreshKind;
use sysinfo::Networks;
use sysinfo::RefreshKind;
use sysinfo::System;
use sysinfo::MINIMUM_CPU_UPDATE_INTERVAL;

use super::DiskUsage;
use super::LoadAverage;
use super::MemoryStats;
use super::MetricSource;
use super::Mount;
use super::NetCounters;
use super::SourceError;

struct HostState {
    system: System,
    cpu_refreshed_at: Instant,
}

/// Reads the local host.
///
/// CPU usage is computed by `sysinfo` from the difference between two
/// refreshes, so the handle is kept for the lifetime of the process. Refreshes
/// closer together than [`MINIMUM_CPU_UPDATE_INTERVAL`] are skipped, which lets
/// every CPU instance sampled in the same tick read the same snapshot.
///
/// All calls block on `/proc` reads or `statvfs`; async callers should run
/// them on the blocking pool.
pub struct SysinfoSource {
    state: Mutex<HostState>,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    /// Blocks for [`MINIMUM_CPU_UPDATE_INTERVAL`] so the first CPU reading
    /// already has two refreshes to compare.
    pub fn new() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::everything()),
        );
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();
        Self {
            state: Mutex::new(HostState {
                system,
                cpu_refreshed_at: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_fresh_cpus<T>(&self, read: impl FnOnce(&System) -> T) -> T {
        let mut state = self.lock();
        if state.cpu_refreshed_at.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL {
            state.system.refresh_cpu_usage();
            state.cpu_refreshed_at = Instant::now();
        }
        read(&state.system)
    }

    fn with_fresh_memory<T>(&self, read: impl FnOnce(&System) -> T) -> T {
        let mut state = self.lock();
        state.system.refresh_memory();
        read(&state.system)
    }
}

impl MetricSource for SysinfoSource {
    fn disk_usage(&self, path: &Path) -> Result<DiskUsage, Report<SourceError>> {
        statvfs(path)
    }

    fn mounts(&self) -> Result<Vec<Mount>, Report<SourceError>> {
        let disks = Disks::new_with_refreshed_list();
        Ok(disks
            .list()
            .iter()
            .map(|disk| Mount {
                mount_point: disk.mount_point().to_path_buf(),
                device: disk.name().to_string_lossy().into_owned(),
                fs_type: disk.file_system().to_string_lossy().into_owned(),
            })
            .collect())
    }

    fn core_count(&self) -> Result<usize, Report<SourceError>> {
        match self.with_fresh_cpus(|system| system.cpus().len()) {
            0 => Err(Report::new(SourceError::NoCpus)),
            count => Ok(count),
        }
    }

    fn cpu_percent(&self) -> Result<f64, Report<SourceError>> {
        Ok(self.with_fresh_cpus(|system| system.global_cpu_usage() as f64))
    }

    fn core_percent(&self, index: usize) -> Result<f64, Report<SourceError>> {
        self.with_fresh_cpus(|system| {
            let cpus = system.cpus();
            cpus.get(index)
                .map(|cpu| cpu.cpu_usage() as f64)
                .ok_or_else(|| {
                    Report::new(SourceError::UnknownCore {
                        index,
                        count: cpus.len(),
                    })
                })
        })
    }

    fn memory(&self) -> Result<MemoryStats, Report<SourceError>> {
        Ok(self.with_fresh_memory(|system| MemoryStats {
            total: system.total_memory(),
            used: system.used_memory(),
            free: system.free_memory(),
        }))
    }

    fn swap(&self) -> Result<MemoryStats, Report<SourceError>> {
        Ok(self.with_fresh_memory(|system| MemoryStats {
            total: system.total_swap(),
            used: system.used_swap(),
            free: system.free_swap(),
        }))
    }

    fn net_counters(&self) -> Result<NetCounters, Report<SourceError>> {
        let networks = Networks::new_with_refreshed_list();
        if networks.list().is_empty() {
            return Err(Report::new(SourceError::Unavailable("network interfaces")));
        }
        Ok(networks
            .list()
            .values()
            .fold(NetCounters::default(), |acc, data| NetCounters {
                bytes_received: acc.bytes_received.saturating_add(data.total_received()),
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
            }))
    }

    fn load_average(&self) -> Result<LoadAverage, Report<SourceError>> {
        let load = System::load_average();
        Ok(LoadAverage {
            one: load.one,
            five: load.five,
            fifteen: load.fifteen,
        })
    }

    fn uptime(&self) -> Result<Duration, Report<SourceError>> {
        Ok(Duration::from_secs(System::uptime()))
    }
}

/// Usage of the filesystem holding `path`, asked of the kernel directly so
/// that tmpfs, network and `/run` mounts are covered too.
fn statvfs(path: &Path) -> Result<DiskUsage, Report<SourceError>> {
    let stat_error = || SourceError::Statvfs(path.to_path_buf());
    let c_path = CString::new(path.as_os_str().as_bytes()).change_context_lazy(stat_error)?;

    let mut stat = MaybeUninit::<libc::statvfs>::zeroed();
    // SAFETY: `c_path` is NUL terminated and `stat` points to writable memory
    // of the right type for the duration of the call.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return Err(Report::new(std::io::Error::last_os_error()).change_context(stat_error()));
    }
    // SAFETY: statvfs returned 0, so the struct is initialized.
    let stat = unsafe { stat.assume_init() };

    let block_size = stat.f_frsize as u64;
    let blocks = |count: u64| count.saturating_mul(block_size);
    let total = blocks(stat.f_blocks as u64);
    // reserved blocks count neither as used nor as free
    let used = blocks((stat.f_blocks as u64).saturating_sub(stat.f_bfree as u64));
    let free = blocks(stat.f_bavail as u64);
    Ok(DiskUsage { total, used, free })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_primes_cpu_usage() {
        let started = Instant::now();
        let source = SysinfoSource::new();
        assert!(started.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL);

        // the primed snapshot is served without another refresh
        let refreshed_at = source.lock().cpu_refreshed_at;
        source.cpu_percent().expect("cpu usage");
        assert_eq!(source.lock().cpu_refreshed_at, refreshed_at);
    }

    #[test]
    fn disk_usage_of_a_plain_directory() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let usage = statvfs(dir.path()).expect("statvfs on temp dir");

        assert!(usage.total > 0);
        assert!(usage.used <= usage.total);
        assert!(usage.free <= usage.total);
        assert!((0.0..=100.0).contains(&usage.used_percent()));
    }

    #[test]
    fn disk_usage_covers_tmpfs() {
        let shm = Path::new("/dev/shm");
        if !shm.is_dir() {
            return;
        }
        let usage = statvfs(shm).expect("statvfs on /dev/shm");
        assert!(usage.total > 0);
        assert!(usage.used.saturating_add(usage.free) <= usage.total);
    }

    #[test]
    fn disk_usage_of_missing_path_is_an_error() {
        let err = statvfs(Path::new("/nonexistent/hostbeacon"))
            .expect_err("missing path must fail");
        assert!(matches!(err.current_context(), SourceError::Statvfs(_)));
    }

    #[test]
    fn reads_live_host() {
        let source = SysinfoSource::new();

        let cores = source.core_count().expect("host reports CPUs");
        assert!(cores > 0);
        let err = source
            .core_percent(cores)
            .expect_err("index past the last core");
        assert!(matches!(
            err.current_context(),
            SourceError::UnknownCore { count, .. } if *count == cores
        ));

        let memory = source.memory().expect("memory stats");
        assert!(memory.total > 0);
        assert!((0.0..=100.0).contains(&memory.used_percent()));
    }
}
