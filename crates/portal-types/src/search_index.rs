//! Search index records: configuration, lifecycle status, run summary
//! and the optional build schedule.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexStatus {
    /// Created but never built.
    #[default]
    Initial,
    /// A build is currently running.
    Indexing,
    /// The last build completed successfully.
    Indexed,
    /// The last build failed.
    Error,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Initial => "INITIAL",
            IndexStatus::Indexing => "INDEXING",
            IndexStatus::Indexed => "INDEXED",
            IndexStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recent build run.
///
/// Written by the executor on both success and failure; operator notes in
/// [`SearchIndex::comment`] are never touched by builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: f64,
    /// Features read from the source during the run.
    pub total: u64,
    /// Features skipped because no search or display values were found.
    pub skipped: u64,
    /// Failure message, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl IndexSummary {
    /// Summary for a completed run.
    pub fn success(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        total: u64,
        skipped: u64,
    ) -> Self {
        Self {
            started_at,
            duration_seconds: duration_seconds(started_at, finished_at),
            total,
            skipped,
            error_message: None,
        }
    }

    /// Summary for a failed run, carrying the counters reached so far.
    pub fn failure(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        total: u64,
        skipped: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            started_at,
            duration_seconds: duration_seconds(started_at, finished_at),
            total,
            skipped,
            error_message: Some(message.into()),
        }
    }
}

fn duration_seconds(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> f64 {
    (finished_at - started_at).num_milliseconds() as f64 / 1000.0
}

impl std::fmt::Display for IndexSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Indexed {} features in {:.3} seconds, started at {}.",
            self.total,
            self.duration_seconds,
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        if self.skipped > 0 {
            write!(
                f,
                " {} features were skipped because no search or display values were found.",
                self.skipped
            )?;
        }
        Ok(())
    }
}

/// Cron schedule attached to a search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSchedule {
    /// Stable job identity, assigned when the task is first scheduled.
    /// `None` until the scheduling hook has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    /// Cron expression controlling when builds fire.
    pub cron_expression: String,
    /// Operator-facing description of the schedule.
    #[serde(default)]
    pub description: String,
    /// Relative priority among scheduled tasks. Negative values are
    /// clamped to zero when the task is registered.
    #[serde(default = "default_task_priority")]
    pub priority: i32,
}

impl TaskSchedule {
    pub fn new(cron_expression: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            uuid: None,
            cron_expression: cron_expression.into(),
            description: description.into(),
            priority: default_task_priority(),
        }
    }
}

fn default_task_priority() -> i32 {
    5
}

/// A configured search index over one feature type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndex {
    pub id: i64,
    pub name: String,
    /// Feature type this index is built over.
    pub feature_type_id: i64,
    /// Attributes whose values become searchable text, in configured order.
    #[serde(default)]
    pub search_fields: Vec<String>,
    /// Attributes whose values are shown with a hit, in configured order.
    #[serde(default)]
    pub display_fields: Vec<String>,
    /// Operator notes. Builds never write this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Finish time of the last successful build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_indexed: Option<DateTime<Utc>>,
    /// Cron schedule, absent for manually built indexes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<TaskSchedule>,
    #[serde(default)]
    pub status: IndexStatus,
    /// Outcome of the most recent build run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<IndexSummary>,
}

impl SearchIndex {
    pub fn new(id: i64, name: impl Into<String>, feature_type_id: i64) -> Self {
        Self {
            id,
            name: name.into(),
            feature_type_id,
            search_fields: Vec::new(),
            display_fields: Vec::new(),
            comment: None,
            last_indexed: None,
            schedule: None,
            status: IndexStatus::default(),
            summary: None,
        }
    }

    pub fn with_search_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_display_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.display_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schedule(mut self, schedule: TaskSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
}
