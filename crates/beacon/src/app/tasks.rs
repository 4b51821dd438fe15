use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::scheduler::Scheduler;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn spawn_scheduler_task(&mut self, scheduler: Scheduler) {
        let token = self.cancellation_token.clone();
        let task = tokio::spawn(async move {
            tracing::info!("Starting metric scheduler task");
            scheduler.run(token).await;
            tracing::info!("Metric scheduler task completed");
        });
        self.tasks.push(task);
    }

    /// wait for tasks to complete or receive shutdown signal
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        let signal_handler = {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                tokio::spawn(async move {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT, initiating graceful shutdown");
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                tokio::spawn(async {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => tracing::info!("Received Ctrl+C, initiating graceful shutdown"),
                        Err(e) => tracing::error!("Failed to listen for Ctrl+C: {e}"),
                    }
                })
            }
        };

        tokio::select! {
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
                self.cancellation_token.cancel();
                self.wait_for_tasks_with_timeout(SHUTDOWN_TIMEOUT).await;
            }
            result = futures::future::select_all(&mut self.tasks) => {
                let (result, _index, _remaining) = result;
                if let Err(e) = result {
                    tracing::error!("Task completed with error: {e}");
                    return Err(e.into());
                }
                tracing::warn!("Task completed unexpectedly");
            }
        }

        Ok(())
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::broadcast::recording::RecordingBroadcaster;
    use crate::platform::mock::MockMetricSource;
    use crate::platform::mock::MockServiceStatus;
    use crate::registry::Registry;
    use crate::sampler::Sampler;

    fn empty_scheduler() -> Scheduler {
        let sampler = Arc::new(Sampler::new(
            Arc::new(MockMetricSource::new()),
            Arc::new(MockServiceStatus::new()),
        ));
        Scheduler::new(
            Registry::default(),
            sampler,
            Arc::new(RecordingBroadcaster::new()),
            Duration::from_secs(1),
        )
    }

    #[test(tokio::test)]
    async fn no_tasks_completes_immediately() {
        let mut tasks = Tasks::new();
        tasks.wait_for_completion().await.unwrap();
    }

    #[test(tokio::test)]
    async fn cancelled_scheduler_task_finishes_within_timeout() {
        let mut tasks = Tasks::new();
        tasks.spawn_scheduler_task(empty_scheduler());
        tasks.cancellation_token.cancel();

        tokio::time::timeout(
            Duration::from_secs(1),
            tasks.wait_for_tasks_with_timeout(SHUTDOWN_TIMEOUT),
        )
        .await
        .expect("scheduler task should stop after cancellation");
        assert!(tasks.tasks.iter().all(JoinHandle::is_finished));
    }
}
