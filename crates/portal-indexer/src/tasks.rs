//! Task runners the scheduler fires.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use portal_scheduler::{JobResult, SchedulerError, TaskContext, TaskRunner};
use portal_solr::SearchEngine;

use crate::executor::IndexExecutor;

/// Builds a search index when its scheduled task fires.
///
/// The outcome message becomes the task's last result; build details land
/// in the index record's own summary, written by the executor.
pub struct IndexTask {
    executor: Arc<IndexExecutor>,
}

impl IndexTask {
    pub fn new(executor: Arc<IndexExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl TaskRunner for IndexTask {
    async fn run(&self, ctx: TaskContext, cancel: CancellationToken) -> JobResult {
        let Some(index_id) = ctx.spec.index_id else {
            return JobResult::Failed(SchedulerError::MissingJobData("index id").to_string());
        };
        match self.executor.build_index(index_id, &cancel).await {
            Ok(_) => JobResult::Success("Index task executed successfully".to_string()),
            Err(e) => {
                error!(job = %ctx.key, index_id, error = %e, "index task failed");
                JobResult::Failed(format!("Index task failed with {e}. Check logs for details"))
            }
        }
    }
}

/// Periodic engine availability check.
pub struct EnginePingTask {
    engine: Arc<dyn SearchEngine>,
}

impl EnginePingTask {
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TaskRunner for EnginePingTask {
    async fn run(&self, _ctx: TaskContext, _cancel: CancellationToken) -> JobResult {
        match self.engine.ping().await {
            Ok(()) => JobResult::Success("Engine is available. Check succeeded.".to_string()),
            Err(e) => {
                warn!(error = %e, "engine ping failed");
                JobResult::Failed("Engine is not available. Check failed.".to_string())
            }
        }
    }
}
