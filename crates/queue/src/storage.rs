//! Task storage: task id to task payload.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::task::{Task, TaskId};

/// Key/value store from task id to task.
#[async_trait]
pub trait TaskStorage: Send + Sync {
    /// Look up a task. Absence is `None`, never an error.
    async fn get(&self, id: &TaskId) -> Option<Arc<dyn Task>>;

    /// Store a task under `id`, replacing any task already stored there.
    async fn put(&self, task: Arc<dyn Task>, id: TaskId) -> bool;
}

/// In-memory task storage. Tasks are never evicted.
#[derive(Default)]
pub struct MemoryTaskStorage {
    tasks: RwLock<HashMap<TaskId, Arc<dyn Task>>>,
}

impl MemoryTaskStorage {
    /// Create an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStorage for MemoryTaskStorage {
    async fn get(&self, id: &TaskId) -> Option<Arc<dyn Task>> {
        self.tasks.read().await.get(id).cloned()
    }

    async fn put(&self, task: Arc<dyn Task>, id: TaskId) -> bool {
        self.tasks.write().await.insert(id, task);
        true
    }
}
