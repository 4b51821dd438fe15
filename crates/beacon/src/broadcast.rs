//! Emission output.
//!
//! Broadcasts travel as `tracing` events on their own target; the subscriber
//! set up in [`crate::logging`] renders them with [`format_line`] and routes
//! them to stdout or a rolling file, away from diagnostics.

/// Target of broadcast events.
pub const BROADCAST_TARGET: &str = "broadcast";

/// Sink for emitted values. Best-effort: failures are never reported back.
pub trait Broadcast: Send + Sync {
    fn broadcast(&self, name: &str, value: f64);
}

/// Production broadcaster.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBroadcaster;

impl Broadcast for TracingBroadcaster {
    fn broadcast(&self, name: &str, value: f64) {
        tracing::info!(target: BROADCAST_TARGET, name, value);
    }
}

/// The single line written per emission.
pub fn format_line(name: &str, value: f64) -> String {
    format!("[BROADCAST] {name}: {value:.2}")
}
