//! Fixed-period driver for the metric workers.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcast;
use crate::registry::MetricInstance;
use crate::registry::Registry;
use crate::sampler::SampleError;
use crate::sampler::Sampler;

/// Owns the registry and drives one long-lived worker per instance.
pub struct Scheduler {
    registry: Registry,
    sampler: Arc<Sampler>,
    broadcaster: Arc<dyn Broadcast>,
    period: Duration,
}

/// Scheduler side of one worker.
struct WorkerHandle {
    name: String,
    ticks: mpsc::Sender<()>,
    /// Set when a tick is handed over, cleared once the worker finished it.
    busy: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn notify(&self) {
        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::debug!(instance = %self.name, "Previous check still running, skipping tick");
            return;
        }
        match self.ticks.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                tracing::debug!(instance = %self.name, "Tick already queued, skipping");
            }
            Err(TrySendError::Closed(())) => {
                tracing::warn!(instance = %self.name, "Metric worker is gone");
            }
        }
    }
}

impl Scheduler {
    pub fn new(
        registry: Registry,
        sampler: Arc<Sampler>,
        broadcaster: Arc<dyn Broadcast>,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            sampler,
            broadcaster,
            period,
        }
    }

    /// Run until `token` is cancelled.
    ///
    /// The first pass starts immediately. On cancellation the worker queues
    /// are closed and the call returns without waiting for checks in flight.
    pub async fn run(self, token: CancellationToken) {
        let Self {
            registry,
            sampler,
            broadcaster,
            period,
        } = self;

        tracing::info!(
            instances = registry.len(),
            period = ?period,
            "Broadcasting initial baseline stats..."
        );
        let workers: Vec<WorkerHandle> = registry
            .into_instances()
            .map(|instance| spawn_worker(instance, sampler.clone(), broadcaster.clone()))
            .collect();

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Scheduler cancelled, stopping metric workers");
                    break;
                }
                _ = ticker.tick() => {
                    for worker in &workers {
                        worker.notify();
                    }
                }
            }
        }
    }
}

fn spawn_worker(
    mut instance: MetricInstance,
    sampler: Arc<Sampler>,
    broadcaster: Arc<dyn Broadcast>,
) -> WorkerHandle {
    let (ticks, mut receiver) = mpsc::channel(1);
    let busy = Arc::new(AtomicBool::new(false));
    let handle = WorkerHandle {
        name: instance.name().to_string(),
        ticks,
        busy: busy.clone(),
    };

    tokio::spawn(async move {
        while receiver.recv().await.is_some() {
            check(&mut instance, &sampler, broadcaster.as_ref()).await;
            busy.store(false, Ordering::Release);
        }
        tracing::trace!(instance = %instance.name(), "Metric worker stopped");
    });
    handle
}

/// One unit of work: sample, evaluate, maybe broadcast.
async fn check(instance: &mut MetricInstance, sampler: &Sampler, broadcaster: &dyn Broadcast) {
    let value = match sampler.sample(instance).await {
        Ok(value) => value,
        Err(e) => {
            match e.current_context() {
                SampleError::RateNotReady => {
                    tracing::trace!(instance = %instance.name(), "Rate baseline recorded");
                }
                SampleError::Measurement | SampleError::TimeSkew => {
                    tracing::debug!(instance = %instance.name(), "Sample skipped: {e:?}");
                }
            }
            return;
        }
    };

    let decision = instance.policy.evaluate(value, Instant::now());
    if decision.emits() {
        tracing::trace!(instance = %instance.name(), %decision, value, "Emitting");
        broadcaster.broadcast(instance.name(), value);
    }
}
