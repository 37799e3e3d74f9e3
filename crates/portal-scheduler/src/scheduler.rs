//! Wrapper around tokio-cron-scheduler.
//!
//! Owns the engine lifecycle and the shutdown token. Triggers registered
//! here carry no task state; the job store resolves the task at fire
//! time, so editing a task never has to touch a live trigger closure.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{SchedulerConfig, SchedulerError};

/// Validate a 6-field cron expression
/// (second minute hour day-of-month month day-of-week).
///
/// # Errors
///
/// `SchedulerError::InvalidCron` when the expression does not parse.
///
/// # Example
///
/// ```
/// use portal_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 0 4 * * *").is_ok());
/// assert!(validate_cron_expression("not a cron").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    // a throwaway job exercises the same parser the engine uses
    Job::new_async(expr, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| SchedulerError::InvalidCron(format!("'{expr}': {e}")))
}

/// Cron engine with lifecycle management and graceful shutdown.
///
/// All triggers fire in the configured timezone. Running tasks receive a
/// clone of the shutdown token and observe it at safe points.
pub struct SchedulerService {
    engine: JobScheduler,
    config: SchedulerConfig,
    timezone: Tz,
    shutdown_token: CancellationToken,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a stopped scheduler. Nothing fires until
    /// [`start`](Self::start) is called.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidTimezone` when the configured timezone is
    /// not a valid IANA name.
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let timezone = config.parse_timezone()?;
        let engine = JobScheduler::new().await?;

        Ok(Self {
            engine,
            config,
            timezone,
            shutdown_token: CancellationToken::new(),
            is_running: AtomicBool::new(false),
        })
    }

    /// Start firing scheduled triggers.
    ///
    /// # Errors
    ///
    /// `SchedulerError::AlreadyRunning` when already started.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.engine.start().await?;
        info!(timezone = %self.timezone.name(), "Scheduler started");
        Ok(())
    }

    /// Stop the scheduler.
    ///
    /// Cancels the shutdown token, sleeps briefly so running tasks can
    /// observe it, then stops the engine.
    ///
    /// # Errors
    ///
    /// `SchedulerError::NotRunning` when the scheduler is not started.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping scheduler");
        self.shutdown_token.cancel();
        tokio::time::sleep(std::time::Duration::from_secs(
            self.config.shutdown_timeout_secs.min(5),
        ))
        .await;

        // engine handles share state; shutting down a clone stops the
        // engine itself
        let mut engine = self.engine.clone();
        if let Err(e) = engine.shutdown().await {
            warn!(error = %e, "error stopping scheduler engine");
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler stopped");
        Ok(())
    }

    /// Token cancelled when the scheduler shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Register a cron trigger in the scheduler timezone.
    ///
    /// `job_fn` runs on every fire with a clone of the shutdown token.
    /// Returns the engine-side trigger id, needed to remove the trigger
    /// again.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidCron` when the expression does not parse.
    pub async fn add_cron_job<F, Fut>(
        &self,
        name: &str,
        cron_expression: &str,
        job_fn: F,
    ) -> Result<uuid::Uuid, SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        validate_cron_expression(cron_expression)?;

        let shutdown_token = self.shutdown_token.clone();
        let job = Job::new_async_tz(cron_expression, self.timezone, move |_uuid, _lock| {
            let token = shutdown_token.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                job_fn(token).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let id = self.engine.add(job).await?;
        info!(job = %name, id = %id, cron = %cron_expression, "Trigger registered");
        Ok(id)
    }

    /// Remove a registered trigger by its engine-side id.
    pub async fn remove_job(&self, id: &uuid::Uuid) -> Result<(), SchedulerError> {
        self.engine.remove(id).await?;
        Ok(())
    }
}
