//! Job identities, task definitions and run bookkeeping.
//!
//! A scheduled task is described by two separate records: an immutable
//! [`JobSpec`] saying what to run and when, and a [`RunResult`] saying
//! what past runs did. Editing a schedule replaces the spec and never
//! touches the accumulated result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default priority for tasks that do not specify one.
pub const DEFAULT_PRIORITY: i32 = 5;

/// Kind of background task, doubling as the job group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Search index build.
    Index,
    /// Search engine availability check.
    EnginePing,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Index => "index",
            TaskType::EnginePing => "engine_ping",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a scheduled job: the task type group plus a stable name.
///
/// The name is generated when the task is first created and stored with
/// the owning record, so the job can be found again across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub task_type: TaskType,
    pub name: Uuid,
}

impl JobKey {
    /// New identity with a random name.
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            name: Uuid::new_v4(),
        }
    }

    /// Identity from a previously stored name.
    pub fn with_name(task_type: TaskType, name: Uuid) -> Self {
        Self { task_type, name }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.task_type, self.name)
    }
}

/// Immutable description of what a scheduled task runs and when.
///
/// Replaced wholesale when a schedule is edited; run bookkeeping lives in
/// [`RunResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub task_type: TaskType,
    /// Operator-facing description.
    pub description: String,
    /// Cron expression in the scheduler's timezone.
    pub cron_expression: String,
    /// Relative priority among tasks, never negative once registered.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Search index this task builds, for index tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<i64>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl JobSpec {
    pub fn new(
        task_type: TaskType,
        description: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            task_type,
            description: description.into(),
            cron_expression: cron_expression.into(),
            priority: DEFAULT_PRIORITY,
            index_id: None,
        }
    }

    /// Set the priority, clamping negative values to zero.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority.max(0);
        self
    }

    pub fn with_index_id(mut self, index_id: i64) -> Self {
        self.index_id = Some(index_id);
        self
    }
}

/// Outcome of a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobResult {
    /// Run completed; the message becomes the task's last result.
    Success(String),
    /// Run failed; the message becomes the task's last result.
    Failed(String),
}

/// Accumulated outcome of a job's runs, kept apart from [`JobSpec`] so a
/// schedule edit cannot clobber it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Message from the most recent run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
    /// When the last successful run finished. Cleared by a failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_finished: Option<DateTime<Utc>>,
    /// Number of successful runs.
    #[serde(default)]
    pub executions: u64,
}

impl RunResult {
    /// Fold one run's outcome into the record.
    ///
    /// Successful runs count as an execution and stamp the finish time;
    /// failed runs keep the count and clear the finish time.
    pub fn apply(&mut self, result: &JobResult, finished: DateTime<Utc>) {
        match result {
            JobResult::Success(message) => {
                self.executions += 1;
                self.last_finished = Some(finished);
                self.last_result = Some(message.clone());
            }
            JobResult::Failed(message) => {
                self.last_finished = None;
                self.last_result = Some(message.clone());
            }
        }
    }
}

/// Everything a task runner is handed for one run.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub key: JobKey,
    pub spec: JobSpec,
}

/// Work executed when a scheduled task fires.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, ctx: TaskContext, cancel: CancellationToken) -> JobResult;
}

/// Outcome of a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Task registered under the returned identity.
    Created(JobKey),
    /// A task with the requested identity already exists; nothing changed.
    AlreadyExists,
}

/// Editable fields of an existing task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    pub description: String,
    pub cron_expression: String,
    pub priority: i32,
}

/// Snapshot of one scheduled task for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    pub key: JobKey,
    pub spec: JobSpec,
    pub result: RunResult,
    /// Whether a run is in flight right now.
    pub running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_serde() {
        assert_eq!(
            serde_json::to_string(&TaskType::EnginePing).unwrap(),
            "\"engine_ping\""
        );
        let parsed: TaskType = serde_json::from_str("\"index\"").unwrap();
        assert_eq!(parsed, TaskType::Index);
    }

    #[test]
    fn test_job_key_display() {
        let name = Uuid::nil();
        let key = JobKey::with_name(TaskType::Index, name);
        assert_eq!(
            key.to_string(),
            "index:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_job_key_new_is_unique() {
        let a = JobKey::new(TaskType::Index);
        let b = JobKey::new(TaskType::Index);
        assert_ne!(a, b);
    }

    #[test]
    fn test_spec_priority_clamped() {
        let spec = JobSpec::new(TaskType::Index, "nightly", "0 0 4 * * *").with_priority(-3);
        assert_eq!(spec.priority, 0);

        let spec = JobSpec::new(TaskType::Index, "nightly", "0 0 4 * * *").with_priority(10);
        assert_eq!(spec.priority, 10);
    }

    #[test]
    fn test_spec_serde_defaults_priority() {
        let spec: JobSpec = serde_json::from_str(
            r#"{"taskType": "index", "description": "d", "cronExpression": "0 0 4 * * *"}"#,
        )
        .unwrap();
        assert_eq!(spec.priority, DEFAULT_PRIORITY);
        assert!(spec.index_id.is_none());
    }

    #[test]
    fn test_run_result_success_counts_execution() {
        let mut result = RunResult::default();
        let finished = Utc::now();
        result.apply(&JobResult::Success("done".to_string()), finished);

        assert_eq!(result.executions, 1);
        assert_eq!(result.last_finished, Some(finished));
        assert_eq!(result.last_result.as_deref(), Some("done"));
    }

    #[test]
    fn test_run_result_failure_clears_finish_time() {
        let mut result = RunResult::default();
        result.apply(&JobResult::Success("done".to_string()), Utc::now());
        assert_eq!(result.executions, 1);

        result.apply(&JobResult::Failed("broke".to_string()), Utc::now());
        assert_eq!(result.executions, 1, "failures do not count as executions");
        assert!(result.last_finished.is_none());
        assert_eq!(result.last_result.as_deref(), Some("broke"));
    }
}
