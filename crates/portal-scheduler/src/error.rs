//! Scheduler error types.

use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors from the scheduler service and task manager.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Cron expression the engine cannot parse
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),

    /// Timezone name that is not a valid IANA identifier
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// No task registered under the identity
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A required task field is missing or empty
    #[error("Job data is missing required field: {0}")]
    MissingJobData(&'static str),

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler is not running")]
    NotRunning,

    /// Failure inside the scheduling engine
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(err: JobSchedulerError) -> Self {
        SchedulerError::Scheduler(err.to_string())
    }
}
