//! Startup recovery: reconcile records and scheduled tasks after a
//! restart.
//!
//! Job identities are stable, so tasks are re-registered under the names
//! stored with the records. Records still marked as building belong to a
//! process that died mid-run and are moved to the error state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use portal_scheduler::{CreateOutcome, JobKey, JobSpec, JobStore, TaskManager, TaskRunner, TaskType};
use portal_types::repository::SearchIndexRepository;
use portal_types::{IndexStatus, IndexSummary};

use crate::error::IndexError;

/// Summary message written to records whose build was lost to a restart.
const INTERRUPTED_MESSAGE: &str = "build interrupted; no active job found at startup";

/// Move indexes stuck in the building state to the error state.
///
/// A record marked as building with no live run behind it can never
/// finish. The previous run's start time is kept in the summary when the
/// record has one. Returns how many records were reset.
pub async fn recover_stale_builds(
    indexes: &Arc<dyn SearchIndexRepository>,
    store: &JobStore,
) -> Result<u64, IndexError> {
    let mut recovered = 0;
    for mut index in indexes.find_by_status(IndexStatus::Indexing).await? {
        let running = index
            .schedule
            .as_ref()
            .and_then(|s| s.uuid)
            .map(|uuid| store.is_running(&JobKey::with_name(TaskType::Index, uuid)))
            .unwrap_or(false);
        if running {
            continue;
        }

        warn!(index_id = index.id, name = %index.name, "resetting interrupted build");
        let started_at = index
            .summary
            .as_ref()
            .map(|s| s.started_at)
            .unwrap_or_else(Utc::now);
        index.status = IndexStatus::Error;
        index.summary = Some(IndexSummary::failure(
            started_at,
            Utc::now(),
            0,
            0,
            INTERRUPTED_MESSAGE,
        ));
        indexes.save(index).await?;
        recovered += 1;
    }
    if recovered > 0 {
        info!(recovered, "reset interrupted index builds");
    }
    Ok(recovered)
}

/// Re-register scheduled tasks for records carrying a job identity.
///
/// One bad record (a cron expression that no longer parses, say) must not
/// keep the rest from being restored, so per-record failures are logged
/// and skipped. Returns how many tasks were registered.
pub async fn restore_scheduled_tasks(
    indexes: &Arc<dyn SearchIndexRepository>,
    manager: &TaskManager,
    runner: Arc<dyn TaskRunner>,
) -> Result<u64, IndexError> {
    let mut restored = 0;
    for index in indexes.find_all().await? {
        let Some(schedule) = &index.schedule else {
            continue;
        };
        let Some(uuid) = schedule.uuid else {
            continue;
        };

        let key = JobKey::with_name(TaskType::Index, uuid);
        let spec = JobSpec::new(TaskType::Index, &schedule.description, &schedule.cron_expression)
            .with_priority(schedule.priority)
            .with_index_id(index.id);
        match manager
            .create_task_with_key(key, spec, Arc::clone(&runner))
            .await
        {
            Ok(CreateOutcome::Created(key)) => {
                info!(index_id = index.id, job = %key, "restored scheduled task");
                restored += 1;
            }
            Ok(CreateOutcome::AlreadyExists) => {
                warn!(index_id = index.id, job = %key, "task already registered, skipping");
            }
            Err(e) => {
                warn!(index_id = index.id, job = %key, error = %e, "could not restore scheduled task");
            }
        }
    }
    Ok(restored)
}
