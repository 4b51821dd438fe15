//! Throughput from cumulative byte counters.

use error_stack::Report;
use tokio::time::Instant;

use crate::sampler::SampleError;

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy)]
struct CounterSample {
    counter: u64,
    at: Instant,
}

/// Turns successive readings of a monotonically increasing counter into a
/// rate in Mbps.
#[derive(Debug, Default, Clone)]
pub struct RateComputer {
    last: Option<CounterSample>,
}

impl RateComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a baseline reading exists.
    pub fn is_primed(&self) -> bool {
        self.last.is_some()
    }

    /// Record `counter` read at `now` and return the rate since the previous
    /// reading.
    ///
    /// The stored baseline is replaced on every call, including failing ones,
    /// so one bad interval never poisons the next.
    ///
    /// # Errors
    ///
    /// - [`SampleError::RateNotReady`] on the first reading
    /// - [`SampleError::TimeSkew`] if no time passed since the previous reading
    pub fn observe(&mut self, counter: u64, now: Instant) -> Result<f64, Report<SampleError>> {
        let Some(previous) = self.last.replace(CounterSample { counter, at: now }) else {
            return Err(Report::new(SampleError::RateNotReady));
        };

        let delta_bytes = counter as f64 - previous.counter as f64;
        let delta_seconds = now
            .checked_duration_since(previous.at)
            .unwrap_or_default()
            .as_secs_f64();
        if delta_seconds <= 0.0 {
            return Err(Report::new(SampleError::TimeSkew));
        }

        // a counter reset shows up as a negative delta
        let mbps = delta_bytes * BITS_PER_BYTE / BITS_PER_MEGABIT / delta_seconds;
        Ok(mbps.max(0.0))
    }
}
