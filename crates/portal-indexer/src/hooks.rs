//! Entity event hooks keeping scheduled tasks and engine documents in
//! step with record changes.
//!
//! The embedding application calls these from its persistence layer:
//! before a search index record is saved, after one is deleted, and
//! around feature type changes.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use portal_scheduler::{CreateOutcome, JobKey, JobSpec, TaskManager, TaskRunner, TaskType, TaskUpdate};
use portal_solr::SearchEngine;
use portal_types::repository::{ApplicationRepository, SearchIndexRepository};
use portal_types::{FeatureType, SearchIndex};

use crate::error::IndexError;
use crate::executor::IndexExecutor;

/// Keeps scheduled build tasks in step with search index records.
pub struct SearchIndexEventHandler {
    manager: Arc<TaskManager>,
    runner: Arc<dyn TaskRunner>,
    applications: Arc<dyn ApplicationRepository>,
}

impl SearchIndexEventHandler {
    pub fn new(
        manager: Arc<TaskManager>,
        runner: Arc<dyn TaskRunner>,
        applications: Arc<dyn ApplicationRepository>,
    ) -> Self {
        Self {
            manager,
            runner,
            applications,
        }
    }

    /// Called before a record is persisted.
    ///
    /// A schedule without a job identity gets a task created and the
    /// assigned identity written back into the record, so the caller must
    /// persist the mutated record. A schedule that already carries an
    /// identity has its task's description, cron expression and priority
    /// updated in place. Records without a schedule are left alone.
    ///
    /// # Errors
    ///
    /// [`IndexError::TaskExists`] when a second schedule is added to a
    /// record that already has a build task.
    pub async fn before_save(&self, index: &mut SearchIndex) -> Result<(), IndexError> {
        let Some(schedule) = index.schedule.clone() else {
            return Ok(());
        };

        match schedule.uuid {
            None => {
                if self.manager.find_index_job(index.id).is_some() {
                    warn!(index_id = index.id, name = %index.name, "build task already scheduled");
                    return Err(IndexError::TaskExists(index.name.clone()));
                }

                let spec =
                    JobSpec::new(TaskType::Index, &schedule.description, &schedule.cron_expression)
                        .with_priority(schedule.priority)
                        .with_index_id(index.id);
                match self.manager.create_task(spec, Arc::clone(&self.runner)).await? {
                    CreateOutcome::Created(key) => {
                        if let Some(s) = index.schedule.as_mut() {
                            s.uuid = Some(key.name);
                        }
                        info!(index_id = index.id, job = %key, "scheduled index build");
                    }
                    CreateOutcome::AlreadyExists => {
                        warn!(index_id = index.id, "job identity collision, task not created");
                    }
                }
            }
            Some(uuid) => match self.manager.get_job_key(TaskType::Index, uuid) {
                Some(key) => {
                    let update = TaskUpdate {
                        description: schedule.description.clone(),
                        cron_expression: schedule.cron_expression.clone(),
                        priority: schedule.priority,
                    };
                    self.manager.update_task(&key, update).await?;
                }
                None => {
                    info!(index_id = index.id, %uuid, "no task registered for stored identity");
                }
            },
        }
        Ok(())
    }

    /// Called after a record is deleted. Removes the scheduled task and
    /// scrubs references from application configuration.
    ///
    /// Best effort: the record is already gone, so failures are logged
    /// rather than returned.
    pub async fn after_delete(&self, index: &SearchIndex) {
        if let Some(uuid) = index.schedule.as_ref().and_then(|s| s.uuid) {
            let key = JobKey::with_name(TaskType::Index, uuid);
            match self.manager.delete_task(&key).await {
                Ok(true) => info!(index_id = index.id, job = %key, "removed scheduled task"),
                Ok(false) => info!(index_id = index.id, job = %key, "no scheduled task to remove"),
                Err(e) => {
                    error!(index_id = index.id, job = %key, error = %e, "could not remove scheduled task")
                }
            }
        }
        match self.applications.clear_search_index_references(index.id).await {
            Ok(0) => {}
            Ok(count) => {
                info!(index_id = index.id, applications = count, "cleared search index references")
            }
            Err(e) => {
                error!(index_id = index.id, error = %e, "could not clear search index references")
            }
        }
    }
}

/// Reacts to feature type changes that affect search indexes.
pub struct FeatureTypeEventHandler {
    indexes: Arc<dyn SearchIndexRepository>,
    executor: Arc<IndexExecutor>,
    engine: Arc<dyn SearchEngine>,
    index_events: Arc<SearchIndexEventHandler>,
}

impl FeatureTypeEventHandler {
    pub fn new(
        indexes: Arc<dyn SearchIndexRepository>,
        executor: Arc<IndexExecutor>,
        engine: Arc<dyn SearchEngine>,
        index_events: Arc<SearchIndexEventHandler>,
    ) -> Self {
        Self {
            indexes,
            executor,
            engine,
            index_events,
        }
    }

    /// Called after a feature type is saved. Rebuilds every index over it
    /// synchronously, so changed attribute configuration (hidden fields
    /// in particular) takes effect right away.
    pub async fn after_save(&self, feature_type: &FeatureType) -> Result<(), IndexError> {
        for index in self.indexes.find_by_feature_type_id(feature_type.id).await? {
            info!(index_id = index.id, feature_type = %feature_type.name, "re-indexing after feature type change");
            let cancel = CancellationToken::new();
            if let Err(e) = self.executor.build_index(index.id, &cancel).await {
                // the record already carries the error state, keep going
                error!(index_id = index.id, error = %e, "error re-indexing");
            }
        }
        Ok(())
    }

    /// Called after a feature type is deleted. Drops dependent index
    /// records together with their engine documents, scheduled tasks and
    /// application references.
    pub async fn after_delete(&self, feature_type: &FeatureType) -> Result<(), IndexError> {
        for index in self.indexes.find_by_feature_type_id(feature_type.id).await? {
            if let Err(e) = self.engine.clear_index(index.id).await {
                warn!(index_id = index.id, error = %e, "could not clear engine documents");
            }
            self.indexes.delete(index.id).await?;
            self.index_events.after_delete(&index).await;
            info!(index_id = index.id, feature_type = %feature_type.name, "removed index of deleted feature type");
        }
        Ok(())
    }
}
