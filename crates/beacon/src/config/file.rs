//! YAML configuration: the raw file model and its validation into typed
//! metric definitions.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use serde::Deserialize;
use thiserror::Error;

use crate::config::duration::deserialize_duration;
use crate::config::duration::deserialize_optional_duration;
use crate::metric::CpuMeasure;
use crate::metric::DiskMeasure;
use crate::metric::MemoryMeasure;
use crate::metric::MetricDefinition;
use crate::metric::MetricKind;
use crate::metric::NetDirection;
use crate::metric::Thresholds;

pub const DEFAULT_CHECK_FREQUENCY: Duration = Duration::from_secs(1);

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}", .path.display())]
    Read { path: PathBuf },
    #[error("malformed configuration")]
    Parse,
    #[error("metric `{metric}`: unknown type `{kind}`")]
    UnknownKind { metric: String, kind: String },
    #[error("metric `{metric}`: unknown measure `{measure}` for type `{kind}`")]
    UnknownMeasure {
        metric: String,
        kind: String,
        measure: String,
    },
    #[error("metric `{metric}`: type `{kind}` requires `{field}`")]
    MissingField {
        metric: String,
        kind: String,
        field: &'static str,
    },
    #[error("invalid duration `{0}`")]
    InvalidDuration(String),
    #[error("check frequency must be greater than zero")]
    ZeroCheckFrequency,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    global: RawGlobal,
    #[serde(default)]
    metrics: BTreeMap<String, RawMetric>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGlobal {
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    check_frequency: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct RawMetric {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    measure: Option<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    diff: f64,
    #[serde(default, deserialize_with = "deserialize_duration")]
    interval: Duration,
    #[serde(default, deserialize_with = "deserialize_duration")]
    resend_interval: Duration,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub check_frequency: Duration,
    pub metrics: BTreeMap<String, MetricDefinition>,
}

impl Config {
    /// Read and validate a configuration file.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Read`] if the file cannot be read
    /// - any other [`ConfigError`] the content fails validation with
    pub fn load(path: &Path) -> Result<Self, Report<ConfigError>> {
        let content = std::fs::read_to_string(path).change_context(ConfigError::Read {
            path: path.to_path_buf(),
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, Report<ConfigError>> {
        let raw: RawConfig = serde_yaml::from_str(content).change_context(ConfigError::Parse)?;

        let check_frequency = raw.global.check_frequency.unwrap_or(DEFAULT_CHECK_FREQUENCY);
        if check_frequency.is_zero() {
            return Err(Report::new(ConfigError::ZeroCheckFrequency));
        }

        let mut metrics = BTreeMap::new();
        for (name, raw_metric) in raw.metrics {
            let definition = raw_metric.into_definition(&name)?;
            let thresholds = &definition.thresholds;
            if thresholds.resend_interval < thresholds.interval {
                tracing::warn!(
                    metric = %name,
                    "resend_interval ({:?}) is shorter than interval ({:?}), heartbeats will dominate",
                    thresholds.resend_interval,
                    thresholds.interval,
                );
            }
            metrics.insert(name, definition);
        }

        Ok(Self {
            check_frequency,
            metrics,
        })
    }
}

impl RawMetric {
    fn into_definition(self, name: &str) -> Result<MetricDefinition, Report<ConfigError>> {
        let measure = self.measure.as_deref().filter(|m| !m.is_empty());
        let unknown_measure = |measure: &str| {
            Report::new(ConfigError::UnknownMeasure {
                metric: name.to_string(),
                kind: self.kind.clone(),
                measure: measure.to_string(),
            })
        };
        let missing = |field: &'static str| {
            Report::new(ConfigError::MissingField {
                metric: name.to_string(),
                kind: self.kind.clone(),
                field,
            })
        };

        let kind = match self.kind.as_str() {
            "disk" | "disk_auto" => {
                let measure = match measure {
                    Some(m) => DiskMeasure::parse(m).ok_or_else(|| unknown_measure(m))?,
                    None => DiskMeasure::default(),
                };
                if self.kind == "disk" {
                    let path = self
                        .path
                        .as_deref()
                        .filter(|p| !p.is_empty())
                        .ok_or_else(|| missing("path"))?;
                    MetricKind::Disk {
                        path: PathBuf::from(path),
                        measure,
                    }
                } else {
                    MetricKind::DiskAuto { measure }
                }
            }
            "service" => {
                let service = self
                    .service
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| missing("service"))?;
                MetricKind::Service {
                    name: service.to_string(),
                }
            }
            "net_rate" => MetricKind::NetRate {
                direction: match measure {
                    Some(m) => NetDirection::parse(m).ok_or_else(|| unknown_measure(m))?,
                    None => NetDirection::default(),
                },
            },
            "cpu" => MetricKind::Cpu(match measure {
                Some(m) => CpuMeasure::parse(m).ok_or_else(|| unknown_measure(m))?,
                None => CpuMeasure::default(),
            }),
            "mem" | "swap" => {
                let measure = match measure {
                    Some(m) => MemoryMeasure::parse(m).ok_or_else(|| unknown_measure(m))?,
                    None => MemoryMeasure::default(),
                };
                if self.kind == "mem" {
                    MetricKind::Memory(measure)
                } else {
                    MetricKind::Swap(measure)
                }
            }
            "load" => MetricKind::Load,
            "uptime" => MetricKind::Uptime,
            other => {
                return Err(Report::new(ConfigError::UnknownKind {
                    metric: name.to_string(),
                    kind: other.to_string(),
                }))
            }
        };

        Ok(MetricDefinition {
            kind,
            thresholds: Thresholds {
                diff: self.diff,
                interval: self.interval,
                resend_interval: self.resend_interval,
            },
        })
    }
}
