//! provides logging helpers

use std::io::Stderr;

use tracing::Subscriber;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::fmt::format::Format;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;

/// Diagnostic output layer: human readable, on stderr, so stdout stays free
/// for machine consumed output.
pub fn get_fmt_layer<S>() -> Layer<S, DefaultFields, Format, fn() -> Stderr>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    layer()
        .with_writer(std::io::stderr as fn() -> Stderr)
        .with_target(true)
}

/// Default env filter, `info` unless `RUST_LOG` says otherwise.
pub fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber
pub fn init() {
    let fmt_layer = get_fmt_layer().with_filter(env_filter());

    registry().with(fmt_layer).init();
}
