use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;
use anyhow::Result;

use crate::app::Application;
use crate::broadcast::TracingBroadcaster;
use crate::config::Config;
use crate::config::RunArgs;
use crate::platform::SysinfoSource;
use crate::platform::SystemctlStatus;
use crate::registry::Registry;
use crate::sampler::Sampler;
use crate::scheduler::Scheduler;

/// Application builder
pub struct ApplicationBuilder {
    run_args: RunArgs,
}

impl ApplicationBuilder {
    pub fn new(run_args: RunArgs) -> Self {
        Self { run_args }
    }

    /// Load the configuration, expand it against the host and assemble the
    /// scheduler.
    pub fn build(self) -> Result<Application> {
        tracing::info!(config = %self.run_args.config.display(), "Building application components...");

        let config = Config::load(&self.run_args.config)
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {e:?}"))?;
        let period = effective_period(self.run_args.check_frequency, config.check_frequency)?;

        let source = Arc::new(SysinfoSource::new());
        let registry = Registry::expand(&config.metrics, source.as_ref());
        if registry.is_empty() {
            tracing::warn!("No metric instances configured, nothing will be broadcast");
        }
        tracing::info!(
            definitions = config.metrics.len(),
            instances = registry.len(),
            period = ?period,
            "Metric registry ready"
        );

        let sampler = Arc::new(Sampler::new(source, Arc::new(SystemctlStatus)));
        let scheduler = Scheduler::new(registry, sampler, Arc::new(TracingBroadcaster), period);

        Ok(Application::new(scheduler, self.run_args))
    }
}

/// The command line frequency wins over the configured one.
fn effective_period(cli: Option<Duration>, configured: Duration) -> Result<Duration> {
    let period = cli.unwrap_or(configured);
    ensure!(!period.is_zero(), "check frequency must be greater than zero");
    Ok(period)
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn command_line_frequency_overrides_config() {
        let period = effective_period(Some(Duration::from_millis(500)), Duration::from_secs(1))
            .expect("valid period");
        assert_eq!(period, Duration::from_millis(500));
    }

    #[test]
    fn config_frequency_applies_without_override() {
        let period = effective_period(None, Duration::from_secs(2)).expect("valid period");
        assert_eq!(period, Duration::from_secs(2));
    }

    #[test]
    fn zero_frequency_is_rejected() {
        assert!(effective_period(Some(Duration::ZERO), Duration::from_secs(1)).is_err());
        assert!(effective_period(None, Duration::ZERO).is_err());
    }
}
