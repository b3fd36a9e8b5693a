//! Subscriber inboxes of the relay.

use async_trait::async_trait;
use tokio::sync::RwLock;
use url::Url;

/// The mutable set of subscriber inbox URLs.
#[async_trait]
pub trait SubscriptionManager: Send + Sync {
    /// Append a subscriber. Duplicates are kept.
    async fn add(&self, target: Url) -> bool;

    /// Remove the first entry equal to `target`.
    ///
    /// Returns `false` if no entry matched.
    async fn remove(&self, target: &Url) -> bool;

    /// Snapshot of the subscribers in insertion order.
    async fn list(&self) -> Vec<Url>;
}

/// In-memory subscription list.
///
/// Repeated adds of one target produce repeated entries, and each entry gets
/// its own forward task.
#[derive(Debug, Default)]
pub struct MemorySubscriptionManager {
    targets: RwLock<Vec<Url>>,
}

impl MemorySubscriptionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given subscribers.
    #[must_use]
    pub fn with_targets(targets: impl IntoIterator<Item = Url>) -> Self {
        Self {
            targets: RwLock::new(targets.into_iter().collect()),
        }
    }
}

#[async_trait]
impl SubscriptionManager for MemorySubscriptionManager {
    async fn add(&self, target: Url) -> bool {
        self.targets.write().await.push(target);
        true
    }

    async fn remove(&self, target: &Url) -> bool {
        let mut targets = self.targets.write().await;
        match targets.iter().position(|t| t == target) {
            Some(index) => {
                targets.remove(index);
                true
            }
            None => false,
        }
    }

    async fn list(&self) -> Vec<Url> {
        self.targets.read().await.clone()
    }
}
