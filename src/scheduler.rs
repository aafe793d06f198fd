use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::models::CycleScope;
use crate::pipeline::{verdict, CycleError, ExitStatus, Monitor, Trigger};

/// Periodic driver for monitoring cycles. Every error is caught and logged
/// here so that one failed cycle never stops the schedule.
pub struct CycleScheduler {
    scheduler: JobScheduler,
    monitor: Arc<Monitor>,
    config: SchedulerConfig,
    job_id: Option<Uuid>,
}

impl CycleScheduler {
    pub async fn new(monitor: Arc<Monitor>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        let config = monitor.config().scheduler.clone();

        Ok(Self {
            scheduler,
            monitor,
            config,
            job_id: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("Periodic monitoring disabled");
            return Ok(());
        }

        self.schedule_monitoring().await?;
        self.scheduler.start().await?;
        tracing::info!(
            interval_secs = self.config.interval_secs,
            "Cycle scheduler started"
        );

        if self.config.run_on_start {
            tokio::spawn(Self::run_scheduled_cycle(Arc::clone(&self.monitor)));
        }

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(job_id) = self.job_id.take() {
            self.scheduler.remove(&job_id).await?;
        }
        self.scheduler.shutdown().await?;
        tracing::info!("Cycle scheduler shutdown");
        Ok(())
    }

    pub fn is_scheduled(&self) -> bool {
        self.job_id.is_some()
    }

    async fn schedule_monitoring(&mut self) -> Result<Uuid> {
        let monitor = Arc::clone(&self.monitor);
        let interval = Duration::from_secs(self.config.interval_secs);

        let job = Job::new_repeated_async(interval, move |_uuid, _l| {
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                Self::run_scheduled_cycle(monitor).await;
            })
        })?;

        let job_id = self.scheduler.add(job).await?;
        self.job_id = Some(job_id);
        tracing::debug!(job = %job_id, "Monitoring job scheduled");
        Ok(job_id)
    }

    /// Runs one full cycle and logs how it ended.
    pub async fn run_scheduled_cycle(monitor: Arc<Monitor>) {
        let result = monitor.run_cycle(CycleScope::All, Trigger::Scheduled).await;

        if matches!(result, Err(CycleError::Busy)) {
            tracing::info!("Skipping scheduled cycle, previous cycle still running");
            return;
        }

        let (status, message) = verdict(&result);
        match status {
            ExitStatus::Success => tracing::debug!("Scheduled cycle done: {}", message),
            ExitStatus::AuthFailure => tracing::warn!("Scheduled cycle: {}", message),
            ExitStatus::FatalError => tracing::error!("Scheduled cycle: {}", message),
        }
    }
}
