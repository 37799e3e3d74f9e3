//! In-memory job store: task specs, run results and the fire path.
//!
//! The scheduler engine only knows opaque trigger closures. Each closure
//! looks its task up here at fire time, so schedule edits and run
//! bookkeeping live in exactly one place.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::job::{
    JobDetails, JobKey, JobResult, JobSpec, RunResult, TaskContext, TaskRunner, TaskType,
};
use crate::run_lock::{RunLock, RunPermit};
use crate::SchedulerError;

struct StoredJob {
    spec: JobSpec,
    result: RunResult,
    /// Engine-side trigger id, set once the cron trigger is registered.
    engine_id: Option<Uuid>,
    /// Fires before this instant are skipped.
    not_before: DateTime<Utc>,
    runner: Arc<dyn TaskRunner>,
    lock: RunLock,
}

/// Thread-safe registry of scheduled tasks keyed by job identity.
pub struct JobStore {
    jobs: RwLock<HashMap<JobKey, StoredJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Reserve an identity. Returns `false` when the key is already taken.
    pub fn insert(
        &self,
        key: JobKey,
        spec: JobSpec,
        runner: Arc<dyn TaskRunner>,
        not_before: DateTime<Utc>,
    ) -> bool {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&key) {
            return false;
        }
        jobs.insert(
            key,
            StoredJob {
                spec,
                result: RunResult::default(),
                engine_id: None,
                not_before,
                runner,
                lock: RunLock::new(),
            },
        );
        true
    }

    /// Record the engine-side id for a registered trigger.
    pub fn set_engine_id(&self, key: &JobKey, id: Uuid) {
        if let Some(job) = self.jobs.write().unwrap().get_mut(key) {
            job.engine_id = Some(id);
        }
    }

    /// Engine-side trigger id for a task, when one is registered.
    pub fn engine_id(&self, key: &JobKey) -> Option<Uuid> {
        self.jobs.read().unwrap().get(key).and_then(|job| job.engine_id)
    }

    /// Remove a task.
    ///
    /// Returns `None` when the key is unknown; otherwise the engine-side
    /// trigger id that still needs deregistering, if any.
    pub fn remove(&self, key: &JobKey) -> Option<Option<Uuid>> {
        self.jobs
            .write()
            .unwrap()
            .remove(key)
            .map(|job| job.engine_id)
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.jobs.read().unwrap().contains_key(key)
    }

    /// Snapshot of one task.
    pub fn details(&self, key: &JobKey) -> Option<JobDetails> {
        self.jobs.read().unwrap().get(key).map(|job| JobDetails {
            key: *key,
            spec: job.spec.clone(),
            result: job.result.clone(),
            running: job.lock.is_running(),
        })
    }

    /// Snapshot of all tasks in a group, ordered by priority.
    pub fn list(&self, task_type: TaskType) -> Vec<JobDetails> {
        let jobs = self.jobs.read().unwrap();
        let mut details: Vec<JobDetails> = jobs
            .iter()
            .filter(|(key, _)| key.task_type == task_type)
            .map(|(key, job)| JobDetails {
                key: *key,
                spec: job.spec.clone(),
                result: job.result.clone(),
                running: job.lock.is_running(),
            })
            .collect();
        details.sort_by(|a, b| {
            a.spec
                .priority
                .cmp(&b.spec.priority)
                .then_with(|| a.key.name.cmp(&b.key.name))
        });
        details
    }

    /// Find the build task for one search index.
    pub fn find_index_job(&self, index_id: i64) -> Option<JobKey> {
        self.jobs
            .read()
            .unwrap()
            .iter()
            .find(|(key, job)| {
                key.task_type == TaskType::Index && job.spec.index_id == Some(index_id)
            })
            .map(|(key, _)| *key)
    }

    /// Replace the spec of an existing task and re-arm its start delay.
    /// The run result is left untouched.
    pub fn update_schedule(&self, key: &JobKey, spec: JobSpec, not_before: DateTime<Utc>) -> bool {
        match self.jobs.write().unwrap().get_mut(key) {
            Some(job) => {
                job.spec = spec;
                job.not_before = not_before;
                true
            }
            None => false,
        }
    }

    /// Whether a run for the identity is currently in flight.
    pub fn is_running(&self, key: &JobKey) -> bool {
        self.jobs
            .read()
            .unwrap()
            .get(key)
            .map(|job| job.lock.is_running())
            .unwrap_or(false)
    }

    /// Fold a finished run into the task's result record.
    pub fn apply_result(&self, key: &JobKey, result: &JobResult, finished: DateTime<Utc>) {
        if let Some(job) = self.jobs.write().unwrap().get_mut(key) {
            job.result.apply(result, finished);
        }
    }

    /// Fire path for a scheduled trigger.
    ///
    /// Looks the task up, applies the start-delay gate and the run lock,
    /// executes the runner and folds the outcome into the run result. A
    /// trigger whose task has been removed is ignored.
    pub async fn run_scheduled(&self, key: &JobKey, cancel: CancellationToken) {
        // the read guard must be dropped before the await below
        let (ctx, runner, permit) = {
            let jobs = self.jobs.read().unwrap();
            let Some(job) = jobs.get(key) else {
                debug!(job = %key, "fired for unknown task, ignoring");
                return;
            };
            if Utc::now() < job.not_before {
                debug!(job = %key, "within start delay, skipping fire");
                return;
            }
            let Some(permit) = job.lock.try_acquire() else {
                warn!(job = %key, "previous run still active, skipping");
                return;
            };
            (
                TaskContext {
                    key: *key,
                    spec: job.spec.clone(),
                },
                job.runner.clone(),
                permit,
            )
        };

        self.execute(ctx, runner, permit, cancel).await;
    }

    /// Run a task right now, outside its schedule.
    ///
    /// Bypasses the start-delay gate but still refuses to overlap a run
    /// already in flight; a skipped trigger is logged, not an error.
    pub async fn trigger(
        &self,
        key: &JobKey,
        cancel: CancellationToken,
    ) -> Result<(), SchedulerError> {
        let (ctx, runner, permit) = {
            let jobs = self.jobs.read().unwrap();
            let Some(job) = jobs.get(key) else {
                return Err(SchedulerError::JobNotFound(key.to_string()));
            };
            let Some(permit) = job.lock.try_acquire() else {
                warn!(job = %key, "previous run still active, skipping");
                return Ok(());
            };
            (
                TaskContext {
                    key: *key,
                    spec: job.spec.clone(),
                },
                job.runner.clone(),
                permit,
            )
        };

        self.execute(ctx, runner, permit, cancel).await;
        Ok(())
    }

    async fn execute(
        &self,
        ctx: TaskContext,
        runner: Arc<dyn TaskRunner>,
        permit: RunPermit,
        cancel: CancellationToken,
    ) {
        let key = ctx.key;
        info!(job = %key, "task started");
        let start = std::time::Instant::now();

        let result = runner.run(ctx, cancel).await;

        let elapsed = start.elapsed();
        match &result {
            JobResult::Success(_) => {
                info!(job = %key, duration_ms = elapsed.as_millis(), "task completed");
            }
            JobResult::Failed(message) => {
                error!(job = %key, duration_ms = elapsed.as_millis(), error = %message, "task failed");
            }
        }

        self.apply_result(&key, &result, Utc::now());
        drop(permit);
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
