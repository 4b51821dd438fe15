//! Per-instance emission decisions.

use derive_more::Display;
use tokio::time::Instant;

use crate::metric::Thresholds;

/// The value and time of the last emission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub value: f64,
    pub at: Instant,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Decision {
    /// First value ever seen for this instance.
    #[display("initial")]
    Initial,
    /// `resend_interval` elapsed since the last emission.
    #[display("heartbeat")]
    Heartbeat,
    /// `interval` elapsed and the value moved by at least `diff`.
    #[display("changed")]
    Changed,
    #[display("suppressed")]
    Suppressed,
}

impl Decision {
    pub fn emits(self) -> bool {
        !matches!(self, Decision::Suppressed)
    }
}

/// Decides whether a freshly sampled value is worth reporting.
///
/// Starts uninitialized (no baseline). The first evaluation always emits and
/// records the baseline; after that, checks run in a fixed order: heartbeat,
/// then the interval gate combined with the diff threshold.
#[derive(Debug, Clone)]
pub struct EmissionPolicy {
    thresholds: Thresholds,
    baseline: Option<Baseline>,
}

impl EmissionPolicy {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            baseline: None,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn evaluate(&mut self, value: f64, now: Instant) -> Decision {
        let Some(baseline) = self.baseline else {
            self.baseline = Some(Baseline { value, at: now });
            return Decision::Initial;
        };

        let elapsed = now.saturating_duration_since(baseline.at);
        let decision = if elapsed >= self.thresholds.resend_interval {
            Decision::Heartbeat
        } else if elapsed >= self.thresholds.interval
            && (value - baseline.value).abs() >= self.thresholds.diff
        {
            Decision::Changed
        } else {
            return Decision::Suppressed;
        };

        self.baseline = Some(Baseline {
            value,
            at: now.max(baseline.at),
        });
        decision
    }
}
