//! Host metrics beacon.
//!
//! Samples a configured set of host metrics on a fixed period and broadcasts
//! only the values worth reporting: the first reading, changes past a
//! threshold, and periodic heartbeats.

pub mod app;
pub mod broadcast;
pub mod config;
pub mod logging;
pub mod metric;
pub mod platform;
pub mod policy;
pub mod rate;
pub mod registry;
pub mod sampler;
pub mod scheduler;
