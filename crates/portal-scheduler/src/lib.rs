//! Background task scheduling for the geoportal index pipeline.
//!
//! Cron-driven tasks with stable identities, built on `tokio-cron-scheduler`:
//!
//! - Timezone-aware cron scheduling with graceful shutdown
//! - A task manager that creates, edits and removes tasks at runtime
//! - One run at a time per job identity; an overlapping fire is skipped,
//!   never queued
//! - A start delay on freshly created or edited tasks so rapid edits
//!   settle before the first run
//! - Job definition and run bookkeeping kept in separate records, so a
//!   schedule edit can never clobber execution history
//! - Fire-and-forget progress broadcasting for long runs

mod config;
mod error;
mod job;
mod manager;
mod progress;
mod run_lock;
mod scheduler;
mod store;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use job::{
    CreateOutcome, JobDetails, JobKey, JobResult, JobSpec, RunResult, TaskContext, TaskRunner,
    TaskType, TaskUpdate, DEFAULT_PRIORITY,
};
pub use manager::TaskManager;
pub use progress::{ProgressChannel, TaskProgressEvent};
pub use run_lock::{RunLock, RunPermit};
pub use scheduler::{validate_cron_expression, SchedulerService};
pub use store::JobStore;
