//! Fire-and-forget progress notifications for running tasks.
//!
//! Long runs publish periodic [`TaskProgressEvent`]s; whoever is
//! interested subscribes. Publishing never blocks the run and never
//! fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::job::TaskType;

const DEFAULT_CAPACITY: usize = 64;

/// Progress of one task run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressEvent {
    /// Task type, named `type` on the wire.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Identifier of this particular run.
    pub instance_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Units of work finished so far.
    pub progress: u64,
    /// Total units of work, when the source can tell upfront.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Extra task-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_data: Option<serde_json::Value>,
}

impl TaskProgressEvent {
    pub fn new(task_type: TaskType, instance_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            task_type,
            instance_id,
            started_at,
            progress: 0,
            total: None,
            task_data: None,
        }
    }

    pub fn with_progress(mut self, progress: u64, total: Option<u64>) -> Self {
        self.progress = progress;
        self.total = total;
        self
    }

    pub fn with_task_data(mut self, task_data: serde_json::Value) -> Self {
        self.task_data = Some(task_data);
        self
    }
}

/// Broadcast channel for task progress.
///
/// Cloning shares the channel; each subscriber gets every event published
/// after it subscribed. Events published with no subscribers are dropped.
#[derive(Clone)]
pub struct ProgressChannel {
    tx: broadcast::Sender<TaskProgressEvent>,
}

impl ProgressChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to current subscribers.
    pub fn publish(&self, event: TaskProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!("progress event dropped, no subscribers");
        }
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let channel = ProgressChannel::default();
        let event = TaskProgressEvent::new(TaskType::Index, Uuid::new_v4(), Utc::now());
        // must not panic or error
        channel.publish(event);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let channel = ProgressChannel::new(8);
        let mut rx = channel.subscribe();

        let event = TaskProgressEvent::new(TaskType::Index, Uuid::new_v4(), Utc::now())
            .with_progress(500, Some(2500))
            .with_task_data(serde_json::json!({"indexId": 7}));
        channel.publish(event.clone());

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
        assert_eq!(received.progress, 500);
        assert_eq!(received.total, Some(2500));
    }

    #[test]
    fn test_wire_shape() {
        let started = Utc::now();
        let id = Uuid::new_v4();
        let event = TaskProgressEvent::new(TaskType::Index, id, started)
            .with_progress(10, None)
            .with_task_data(serde_json::json!({"indexId": 3}));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "index");
        assert_eq!(value["instanceId"], id.to_string());
        assert_eq!(value["progress"], 10);
        assert_eq!(value["taskData"]["indexId"], 3);
        // total omitted when unknown
        assert!(value.get("total").is_none());
    }
}
