//! provides logging helpers

use std::fmt;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use tracing::field::Field;
use tracing::field::Visit;
use tracing::Event;
use tracing::Subscriber;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::non_blocking::NonBlockingBuilder;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::FilterExt;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::fmt::FormatFields;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::broadcast::format_line;
use crate::broadcast::BROADCAST_TARGET;

const MAX_BROADCAST_FILES: usize = 7;

/// Renders broadcast events as bare `[BROADCAST] name: value` lines.
struct BroadcastFormatter;

#[derive(Default)]
struct BroadcastVisitor {
    name: Option<String>,
    value: Option<f64>,
}

impl Visit for BroadcastVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "name" {
            self.name = Some(value.to_string());
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if field.name() == "value" {
            self.value = Some(value);
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

impl<S, N> FormatEvent<S, N> for BroadcastFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = BroadcastVisitor::default();
        event.record(&mut visitor);

        // events without both fields are not broadcasts
        if let (Some(name), Some(value)) = (visitor.name, visitor.value) {
            writeln!(writer, "{}", format_line(&name, value))?;
        }
        Ok(())
    }
}

fn is_broadcast(metadata: &tracing::Metadata<'_>) -> bool {
    metadata.target() == BROADCAST_TARGET
}

/// Layer that writes broadcast events, and nothing else, to `writer`.
fn broadcast_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    layer()
        .event_format(BroadcastFormatter)
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter::filter_fn(is_broadcast))
}

fn broadcast_writer(broadcast_file: Option<&Path>) -> Result<(NonBlocking, WorkerGuard)> {
    let builder = NonBlockingBuilder::default().lossy(false);
    let Some(broadcast_file) = broadcast_file else {
        return Ok(builder.finish(std::io::stdout()));
    };

    let directory = match broadcast_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = broadcast_file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| {
            format!(
                "broadcast file name is not valid: {}",
                broadcast_file.display()
            )
        })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_BROADCAST_FILES)
        .build(directory)
        .with_context(|| {
            format!(
                "failed to create rolling broadcast file in {}",
                directory.display()
            )
        })?;
    Ok(builder.finish(appender))
}

/// Install the global subscriber: diagnostics on stderr, broadcasts on stdout
/// or in a daily rolling `broadcast_file`.
///
/// The returned guard flushes pending broadcasts when dropped; keep it alive
/// for the lifetime of the process.
pub fn init(broadcast_file: Option<&Path>) -> Result<WorkerGuard> {
    let fmt_layer = utils::logging::get_fmt_layer().with_filter(
        utils::logging::env_filter().and(filter::filter_fn(|metadata| !is_broadcast(metadata))),
    );

    let (writer, guard) = broadcast_writer(broadcast_file)?;

    registry()
        .with(fmt_layer)
        .with(broadcast_layer(writer))
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::Mutex;

    use similar_asserts::assert_eq;

    use super::*;
    use crate::broadcast::Broadcast;
    use crate::broadcast::TracingBroadcaster;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn broadcast_layer_writes_only_broadcast_lines() {
        let buffer = Buffer::default();
        let subscriber = registry().with(broadcast_layer(buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("diagnostic message");
            TracingBroadcaster.broadcast("disk_root", 42.0);
            tracing::warn!(target: "hostbeacon::registry", "another diagnostic");
            TracingBroadcaster.broadcast("cpu_core_3", 7.456);
        });

        assert_eq!(
            buffer.contents(),
            "[BROADCAST] disk_root: 42.00\n[BROADCAST] cpu_core_3: 7.46\n"
        );
    }

    #[test]
    fn rolling_file_writer_is_created_next_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broadcast.log");
        let (_writer, _guard) = broadcast_writer(Some(&path)).expect("rolling writer");
    }

    #[test]
    fn rolling_file_writer_rejects_directory_path() {
        assert!(broadcast_writer(Some(Path::new("/"))).is_err());
    }
}
