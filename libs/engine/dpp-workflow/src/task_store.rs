use dtr_models::DppTask;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory task store keyed by task id. Tasks
/// are never evicted here; an external reaper is the source system's
/// stated mechanism for that, out of scope for this crate. Concurrent
/// reads and single-writer updates per task are both served from one map
/// lock; updates read-modify-write under the write guard so no caller ever
/// observes a torn update.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<Uuid, DppTask>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: DppTask) {
        self.tasks.write().await.insert(task.task_id, task);
    }

    pub async fn get(&self, task_id: Uuid) -> Option<DppTask> {
        self.tasks.read().await.get(&task_id).cloned()
    }

    pub async fn update(&self, task_id: Uuid, f: impl FnOnce(&mut DppTask)) {
        if let Some(task) = self.tasks.write().await.get_mut(&task_id) {
            f(task);
        }
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = TaskStore::new();
        let task_id = Uuid::new_v4();
        store.insert(DppTask::new(task_id)).await;

        let task = store.get(task_id).await.unwrap();
        assert_eq!(task.task_id, task_id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_mutates_in_place() {
        let store = TaskStore::new();
        let task_id = Uuid::new_v4();
        store.insert(DppTask::new(task_id)).await;

        store.update(task_id, |task| task.fail("boom")).await;

        let task = store.get(task_id).await.unwrap();
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn unknown_task_id_returns_none() {
        let store = TaskStore::new();
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }
}
