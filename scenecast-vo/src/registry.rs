//! In-memory task registry
//!
//! Arena-style map from task id to the owned task record. All mutation
//! goes through the single worker that owns the task; status queries and
//! the progress transport receive cloned snapshots, never a live
//! reference, so no lock is ever held across a provider call.

use scenecast_common::api::types::TaskStatusResponse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::AudioTask;

/// Shared registry of live voiceover tasks
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<Uuid, AudioTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly submitted task
    pub async fn insert(&self, task: AudioTask) {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.task_id, task);
    }

    /// Clone the current task record
    ///
    /// Never blocks on in-flight work: the owning worker only holds the
    /// map lock for the duration of a field update, not across awaits.
    pub async fn snapshot(&self, task_id: Uuid) -> Option<AudioTask> {
        let tasks = self.tasks.read().await;
        tasks.get(&task_id).cloned()
    }

    /// Status projection of the current task record
    pub async fn status(&self, task_id: Uuid) -> Option<TaskStatusResponse> {
        let tasks = self.tasks.read().await;
        tasks.get(&task_id).map(|t| t.status_response())
    }

    /// Mutate the task record in place
    ///
    /// Only the worker that owns the task may call this; the closure runs
    /// synchronously under the write lock and must not block.
    pub async fn update<F, R>(&self, task_id: Uuid, mutate: F) -> Option<R>
    where
        F: FnOnce(&mut AudioTask) -> R,
    {
        let mut tasks = self.tasks.write().await;
        tasks.get_mut(&task_id).map(mutate)
    }

    /// Number of registered tasks
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_common::api::types::{PublicStatus, SubmitTaskRequest, TaskState};

    fn request() -> SubmitTaskRequest {
        SubmitTaskRequest {
            text: "사과 3개".to_string(),
            voice_id: "nara".to_string(),
            language: "ko".to_string(),
            accuracy_threshold: 0.95,
            max_attempts: 5,
        }
    }

    #[tokio::test]
    async fn snapshot_is_a_copy_not_a_reference() {
        let registry = TaskRegistry::new();
        let task = AudioTask::new(request());
        let task_id = task.task_id;
        registry.insert(task).await;

        let mut snapshot = registry.snapshot(task_id).await.unwrap();
        snapshot.transition_to(TaskState::Failed);

        // The stored record is unaffected by mutating the snapshot
        let fresh = registry.snapshot(task_id).await.unwrap();
        assert_eq!(fresh.state, TaskState::Pending);
    }

    #[tokio::test]
    async fn update_is_visible_to_later_snapshots() {
        let registry = TaskRegistry::new();
        let task = AudioTask::new(request());
        let task_id = task.task_id;
        registry.insert(task).await;

        registry
            .update(task_id, |t| {
                t.transition_to(TaskState::Normalizing);
            })
            .await
            .unwrap();

        let status = registry.status(task_id).await.unwrap();
        assert_eq!(status.status, PublicStatus::Running);
        assert_eq!(status.state, TaskState::Normalizing);
    }

    #[tokio::test]
    async fn unknown_task_returns_none() {
        let registry = TaskRegistry::new();
        assert!(registry.snapshot(Uuid::new_v4()).await.is_none());
        assert!(registry.status(Uuid::new_v4()).await.is_none());
        assert!(registry.update(Uuid::new_v4(), |_| ()).await.is_none());
    }
}
