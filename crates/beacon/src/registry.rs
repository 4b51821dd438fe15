//! Expansion of metric definitions into concrete, uniquely named instances.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use thiserror::Error;

use crate::metric::CpuMeasure;
use crate::metric::DiskMeasure;
use crate::metric::MetricDefinition;
use crate::metric::MetricKind;
use crate::metric::Probe;
use crate::metric::Thresholds;
use crate::platform::MetricSource;
use crate::platform::Mount;
use crate::policy::EmissionPolicy;
use crate::rate::RateComputer;

const REAL_FILESYSTEMS: [&str; 4] = ["ext4", "xfs", "apfs", "zfs"];

/// One monitored quantity with its own emission and rate state.
#[derive(Debug)]
pub struct MetricInstance {
    name: String,
    pub(crate) probe: Probe,
    pub(crate) policy: EmissionPolicy,
    pub(crate) rate: RateComputer,
}

impl MetricInstance {
    pub fn new(name: String, probe: Probe, thresholds: Thresholds) -> Self {
        Self {
            name,
            probe,
            policy: EmissionPolicy::new(thresholds),
            rate: RateComputer::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    pub fn thresholds(&self) -> &Thresholds {
        self.policy.thresholds()
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to enumerate mounted filesystems")]
    Mounts,
    #[error("failed to count CPU cores")]
    Cores,
}

/// Owned set of metric instances, keyed by instance name.
#[derive(Debug, Default)]
pub struct Registry {
    instances: BTreeMap<String, MetricInstance>,
}

impl Registry {
    /// Expand every definition against the host.
    ///
    /// A definition whose discovery fails is skipped with a warning. When two
    /// instances end up with the same name the first one wins.
    pub fn expand(
        definitions: &BTreeMap<String, MetricDefinition>,
        source: &dyn MetricSource,
    ) -> Self {
        let mut registry = Self::default();
        for (key, definition) in definitions {
            match targets(key, &definition.kind, source) {
                Ok(targets) => {
                    for (name, probe) in targets {
                        registry.insert(MetricInstance::new(name, probe, definition.thresholds));
                    }
                }
                Err(e) => {
                    tracing::warn!(metric = %key, "Skipping metric, discovery failed: {e:?}");
                }
            }
        }
        registry
    }

    fn insert(&mut self, instance: MetricInstance) {
        match self.instances.entry(instance.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(instance);
            }
            Entry::Occupied(existing) => {
                tracing::warn!(
                    instance = %instance.name,
                    kept = %existing.get().probe,
                    skipped = %instance.probe,
                    "Duplicate metric instance name, skipping"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MetricInstance> {
        self.instances.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricInstance> {
        self.instances.values()
    }

    pub fn into_instances(self) -> impl Iterator<Item = MetricInstance> {
        self.instances.into_values()
    }
}

fn targets(
    key: &str,
    kind: &MetricKind,
    source: &dyn MetricSource,
) -> Result<Vec<(String, Probe)>, Report<DiscoveryError>> {
    let probe = match kind {
        MetricKind::DiskAuto { measure } => return discover_disks(key, *measure, source),
        MetricKind::Cpu(CpuMeasure::PerCore) => {
            let count = source.core_count().change_context(DiscoveryError::Cores)?;
            tracing::info!(metric = %key, cores = count, "Expanding per-core CPU metric");
            return Ok((0..count)
                .map(|index| (format!("cpu_core_{index}"), Probe::CpuCore(index)))
                .collect());
        }
        MetricKind::Cpu(CpuMeasure::Total) => Probe::CpuTotal,
        MetricKind::Disk { path, measure } => Probe::Disk {
            path: path.clone(),
            measure: *measure,
        },
        MetricKind::Service { name } => Probe::Service { name: name.clone() },
        MetricKind::NetRate { direction } => Probe::NetRate {
            direction: *direction,
        },
        MetricKind::Memory(measure) => Probe::Memory(*measure),
        MetricKind::Swap(measure) => Probe::Swap(*measure),
        MetricKind::Load => Probe::Load,
        MetricKind::Uptime => Probe::Uptime,
    };
    Ok(vec![(key.to_string(), probe)])
}

fn discover_disks(
    key: &str,
    measure: DiskMeasure,
    source: &dyn MetricSource,
) -> Result<Vec<(String, Probe)>, Report<DiscoveryError>> {
    let mounts = source.mounts().change_context(DiscoveryError::Mounts)?;
    Ok(mounts
        .into_iter()
        .filter(is_real_storage)
        .map(|mount| {
            let name = format!("{key}{}", mount_suffix(&mount.mount_point));
            tracing::info!(
                instance = %name,
                mount_point = %mount.mount_point.display(),
                device = %mount.device,
                fs_type = %mount.fs_type,
                "Discovered disk"
            );
            (name, Probe::Disk {
                path: mount.mount_point,
                measure,
            })
        })
        .collect())
}

/// Block devices and well-known local filesystems; skips tmpfs, proc and
/// friends.
fn is_real_storage(mount: &Mount) -> bool {
    mount.device.starts_with("/dev/") || REAL_FILESYSTEMS.contains(&mount.fs_type.as_str())
}

fn mount_suffix(mount_point: &Path) -> String {
    if mount_point == Path::new("/") {
        "_root".to_string()
    } else {
        mount_point.to_string_lossy().replace('/', "_")
    }
}
