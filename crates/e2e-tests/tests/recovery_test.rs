//! Restart recovery tests: builds interrupted by a crash are surfaced on
//! the record, and persisted schedules come back under their stored
//! identities.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use e2e_tests::{road_features, roads_feature_type, roads_index, TestHarness};
use portal_indexer::{recover_stale_builds, restore_scheduled_tasks};
use portal_scheduler::{TaskRunner, TaskType};
use portal_types::repository::SearchIndexRepository;
use portal_types::IndexStatus;

/// After a crash mid-build the record is reset to the error state, its
/// schedule is restored once under the stored identity, and the restored
/// task still runs.
#[tokio::test(flavor = "multi_thread")]
async fn test_restart_recovers_interrupted_build() {
    // 1. Harness standing in for a freshly restarted process
    let harness = TestHarness::new().await;
    harness.source.set_features(road_features(2));
    harness.feature_types.insert(roads_feature_type());

    // 2. A record persisted mid-build by the previous process: marked as
    //    building, task identity stored, but no task registered here
    let uuid = Uuid::new_v4();
    let mut index = roads_index(1);
    index.schedule.as_mut().unwrap().uuid = Some(uuid);
    index.status = IndexStatus::Indexing;
    harness.indexes.insert(index);

    let indexes: Arc<dyn SearchIndexRepository> = harness.indexes.clone();

    // 3. Recovery flags the interrupted build on the record
    let recovered = recover_stale_builds(&indexes, &harness.store).await.unwrap();
    assert_eq!(recovered, 1);

    let stored = harness.indexes.get(1).unwrap();
    assert_eq!(stored.status, IndexStatus::Error);
    assert_eq!(
        stored.summary.unwrap().error_message.as_deref(),
        Some("build interrupted; no active job found at startup")
    );

    // 4. The schedule is restored under the stored identity, exactly once
    let runner: Arc<dyn TaskRunner> = harness.runner.clone();
    let restored = restore_scheduled_tasks(&indexes, &harness.manager, runner.clone())
        .await
        .unwrap();
    assert_eq!(restored, 1);
    let key = harness
        .manager
        .get_job_key(TaskType::Index, uuid)
        .expect("task restored under stored identity");

    let restored_again = restore_scheduled_tasks(&indexes, &harness.manager, runner)
        .await
        .unwrap();
    assert_eq!(restored_again, 0);

    // 5. The restored task builds the index
    harness.manager.run_now(&key).await.unwrap();
    assert_eq!(harness.indexes.get(1).unwrap().status, IndexStatus::Indexed);
    assert_eq!(harness.engine.documents_for(1).len(), 2);
}

/// Records that finished cleanly are left alone by recovery.
#[tokio::test(flavor = "multi_thread")]
async fn test_recovery_ignores_settled_records() {
    let harness = TestHarness::new().await;
    harness.source.set_features(road_features(1));
    let scheduled = harness.scheduled_roads_index().await;

    let mut settled = roads_index(2);
    settled.schedule = None;
    settled.status = IndexStatus::Indexed;
    harness.indexes.insert(settled);

    let indexes: Arc<dyn SearchIndexRepository> = harness.indexes.clone();
    let recovered = recover_stale_builds(&indexes, &harness.store).await.unwrap();
    assert_eq!(recovered, 0);

    assert_eq!(harness.indexes.get(2).unwrap().status, IndexStatus::Indexed);
    assert_eq!(
        harness.indexes.get(1).unwrap().status,
        scheduled.status
    );
}
