use anyhow::Result;

use crate::app::tasks::Tasks;
use crate::config::RunArgs;
use crate::scheduler::Scheduler;

/// Application core structure with explicit dependencies
pub struct Application {
    scheduler: Scheduler,
    run_args: RunArgs,
}

impl Application {
    pub fn new(scheduler: Scheduler, run_args: RunArgs) -> Self {
        Self {
            scheduler,
            run_args,
        }
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            config = %self.run_args.config.display(),
            "Starting all application tasks..."
        );

        let mut tasks = Tasks::new();
        tasks.spawn_scheduler_task(self.scheduler);

        if let Err(e) = tasks.wait_for_completion().await {
            tracing::error!("Error during task execution: {e}");
            return Err(e);
        }

        tracing::info!("Application run completed");
        Ok(())
    }
}
