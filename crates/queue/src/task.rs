//! Task identifiers and the task capability.

use std::fmt;

use async_trait::async_trait;
use ferry_common::IdGenerator;

use crate::forward::DeliveryError;

/// Opaque, globally unique task identifier. Equality is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    /// Mint a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(IdGenerator::new().generate())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Error returned by a failed task run.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("task failed: {0}")]
    Failed(String),
}

/// A unit of deferred work.
///
/// Workers only see this capability; they never know the concrete task type.
#[async_trait]
pub trait Task: Send + Sync {
    /// Identifier this task was stored and queued under.
    fn id(&self) -> &TaskId;

    /// Execute the task once.
    async fn run(&self) -> Result<(), TaskError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_task_id_equality_by_value() {
        let a = TaskId::from("a");
        let b = TaskId::from("a".to_string());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "a");

        let set: HashSet<TaskId> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 26);
    }
}
