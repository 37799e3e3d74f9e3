//! Error path tests: a failed build must leave a useful record state and
//! an honest task history behind, never a wedged pipeline.

use pretty_assertions::assert_eq;

use e2e_tests::{road_features, roads_feature_type, TestHarness};
use portal_scheduler::TaskType;
use portal_types::{IndexStatus, SearchIndex, TaskSchedule};

/// A record without search fields fails validation before any engine call
/// and ends up in the error state with the validation message.
#[tokio::test(flavor = "multi_thread")]
async fn test_build_without_search_fields_fails_fast() {
    let harness = TestHarness::new().await;
    harness.source.set_features(road_features(5));
    harness.feature_types.insert(roads_feature_type());

    // display fields alone are not enough to build an index
    let mut index = SearchIndex::new(1, "Empty", 10)
        .with_display_fields(["name"])
        .with_schedule(TaskSchedule::new("0 0 4 * * *", "misconfigured"));
    harness.handler.before_save(&mut index).await.unwrap();
    harness.indexes.insert(index.clone());

    let uuid = index.schedule.as_ref().unwrap().uuid.unwrap();
    let key = harness.manager.get_job_key(TaskType::Index, uuid).unwrap();
    harness.manager.run_now(&key).await.unwrap();

    let stored = harness.indexes.get(1).unwrap();
    assert_eq!(stored.status, IndexStatus::Error);
    assert_eq!(
        stored.summary.unwrap().error_message.as_deref(),
        Some("No search fields configured")
    );

    // the engine was never touched
    assert!(harness.engine.cleared().is_empty());
    assert!(harness.engine.batches().is_empty());
    assert_eq!(harness.engine.commits(), 0);

    let details = harness.store.details(&key).unwrap();
    assert_eq!(details.result.executions, 0);
    assert_eq!(details.result.last_finished, None);
    assert_eq!(
        details.result.last_result.as_deref(),
        Some("Index task failed with No search fields configured. Check logs for details")
    );
}

/// A run for a record that has since been deleted fails, clearing the
/// finish timestamp while keeping the count of successful executions.
#[tokio::test(flavor = "multi_thread")]
async fn test_missing_record_fails_but_keeps_history() {
    let harness = TestHarness::new().await;
    harness.source.set_features(road_features(2));
    let index = harness.scheduled_roads_index().await;
    let uuid = index.schedule.as_ref().unwrap().uuid.unwrap();
    let key = harness.manager.get_job_key(TaskType::Index, uuid).unwrap();

    harness.manager.run_now(&key).await.unwrap();
    assert_eq!(harness.store.details(&key).unwrap().result.executions, 1);

    // the record vanishes but the task lingers until the delete hook runs
    harness.indexes.remove(1);
    harness.manager.run_now(&key).await.unwrap();

    let details = harness.store.details(&key).unwrap();
    assert_eq!(details.result.executions, 1);
    assert_eq!(details.result.last_finished, None);
    assert_eq!(
        details.result.last_result.as_deref(),
        Some("Index task failed with Search index 1 not found. Check logs for details")
    );
}
