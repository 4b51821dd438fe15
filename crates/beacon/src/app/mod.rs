//! Application module
//!
//! Wiring and lifecycle of the `run` command.

pub mod builder;
pub mod core;
pub mod tasks;

pub use builder::ApplicationBuilder;
pub use core::Application;
