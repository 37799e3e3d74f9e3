//! Task manager: the write path for scheduled tasks.
//!
//! Couples the job store (what to run) to the scheduler engine (when to
//! fire). All create, edit and delete traffic goes through here so the
//! two stay in sync.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::job::{
    CreateOutcome, JobDetails, JobKey, JobSpec, TaskRunner, TaskType, TaskUpdate,
};
use crate::scheduler::{validate_cron_expression, SchedulerService};
use crate::store::JobStore;
use crate::SchedulerError;

/// Creates, edits and removes scheduled tasks.
pub struct TaskManager {
    scheduler: Arc<SchedulerService>,
    store: Arc<JobStore>,
}

impl TaskManager {
    pub fn new(scheduler: Arc<SchedulerService>, store: Arc<JobStore>) -> Self {
        Self { scheduler, store }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    fn start_delay(&self) -> Duration {
        Duration::seconds(self.scheduler.config().task_start_delay_secs as i64)
    }

    /// Create a new task under a fresh identity.
    ///
    /// The first fire is held back by the configured start delay so rapid
    /// edits settle before anything runs.
    ///
    /// # Errors
    ///
    /// `MissingJobData` when the description is empty, `InvalidCron` when
    /// the expression does not parse.
    pub async fn create_task(
        &self,
        spec: JobSpec,
        runner: Arc<dyn TaskRunner>,
    ) -> Result<CreateOutcome, SchedulerError> {
        self.create_task_with_key(JobKey::new(spec.task_type), spec, runner)
            .await
    }

    /// Create a task under a caller-provided identity.
    ///
    /// Used when restoring tasks whose identity is already persisted with
    /// the owning record. Creating an identity that already exists is
    /// reported as [`CreateOutcome::AlreadyExists`], not an error.
    pub async fn create_task_with_key(
        &self,
        key: JobKey,
        mut spec: JobSpec,
        runner: Arc<dyn TaskRunner>,
    ) -> Result<CreateOutcome, SchedulerError> {
        if spec.description.trim().is_empty() {
            return Err(SchedulerError::MissingJobData("description"));
        }
        validate_cron_expression(&spec.cron_expression)?;
        spec.priority = spec.priority.max(0);

        let not_before = Utc::now() + self.start_delay();
        if !self.store.insert(key, spec.clone(), runner, not_before) {
            warn!(job = %key, "task already exists, not creating");
            return Ok(CreateOutcome::AlreadyExists);
        }

        match self.register_trigger(key, &spec.cron_expression).await {
            Ok(engine_id) => {
                self.store.set_engine_id(&key, engine_id);
                info!(job = %key, cron = %spec.cron_expression, priority = spec.priority, "task created");
                Ok(CreateOutcome::Created(key))
            }
            Err(e) => {
                // a failed registration must not leave a dead reservation behind
                self.store.remove(&key);
                Err(e)
            }
        }
    }

    /// Update an existing task's schedule.
    ///
    /// Unknown identities are a no-op: the owning record may carry a name
    /// that was never registered. The run result is preserved; only the
    /// spec and trigger are replaced, and the start delay is re-armed.
    pub async fn update_task(&self, key: &JobKey, update: TaskUpdate) -> Result<(), SchedulerError> {
        let Some(details) = self.store.details(key) else {
            info!(job = %key, "update for unknown task, ignoring");
            return Ok(());
        };

        if update.description.trim().is_empty() {
            return Err(SchedulerError::MissingJobData("description"));
        }
        validate_cron_expression(&update.cron_expression)?;

        let mut spec = details.spec;
        spec.description = update.description;
        spec.cron_expression = update.cron_expression.clone();
        spec.priority = update.priority.max(0);

        // re-arm the start delay first so nothing fires mid-swap
        let not_before = Utc::now() + self.start_delay();
        self.store.update_schedule(key, spec, not_before);

        if let Some(old_id) = self.store.engine_id(key) {
            self.scheduler.remove_job(&old_id).await?;
        }
        let engine_id = self.register_trigger(*key, &update.cron_expression).await?;
        self.store.set_engine_id(key, engine_id);

        info!(job = %key, cron = %update.cron_expression, "task updated");
        Ok(())
    }

    /// Delete a task. Returns whether a task existed under the identity.
    pub async fn delete_task(&self, key: &JobKey) -> Result<bool, SchedulerError> {
        match self.store.remove(key) {
            None => Ok(false),
            Some(engine_id) => {
                if let Some(id) = engine_id {
                    self.scheduler.remove_job(&id).await?;
                }
                info!(job = %key, "task deleted");
                Ok(true)
            }
        }
    }

    /// Look up a job identity by type and stored name.
    pub fn get_job_key(&self, task_type: TaskType, name: Uuid) -> Option<JobKey> {
        let key = JobKey::with_name(task_type, name);
        self.store.contains(&key).then_some(key)
    }

    /// Find the build task for one search index.
    pub fn find_index_job(&self, index_id: i64) -> Option<JobKey> {
        self.store.find_index_job(index_id)
    }

    /// Snapshot of all tasks in a group, ordered by priority.
    pub fn list_tasks(&self, task_type: TaskType) -> Vec<JobDetails> {
        self.store.list(task_type)
    }

    pub fn job_exists(&self, key: &JobKey) -> bool {
        self.store.contains(key)
    }

    /// Run a task immediately, outside its schedule.
    ///
    /// Bypasses the start delay but still refuses to overlap a run in
    /// flight.
    pub async fn run_now(&self, key: &JobKey) -> Result<(), SchedulerError> {
        self.store
            .trigger(key, self.scheduler.shutdown_token())
            .await
    }

    async fn register_trigger(
        &self,
        key: JobKey,
        cron_expression: &str,
    ) -> Result<Uuid, SchedulerError> {
        let store = self.store.clone();
        let name = key.to_string();
        self.scheduler
            .add_cron_job(&name, cron_expression, move |cancel| {
                let store = store.clone();
                async move {
                    store.run_scheduled(&key, cancel).await;
                }
            })
            .await
    }
}
