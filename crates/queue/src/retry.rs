//! Retry configuration and dead letter handling for failed tasks.

#![allow(missing_docs)]

use std::time::Duration;

use ferry_common::config::DeliveryConfig;
use tokio::sync::RwLock;

use crate::task::TaskId;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first run.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    /// Single-shot: a failed task goes straight to the dead letters.
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
        }
    }
}

impl From<&DeliveryConfig> for RetryConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_secs(config.initial_backoff_secs),
            max_delay: Duration::from_secs(config.max_backoff_secs),
            ..Self::default()
        }
    }
}

impl RetryConfig {
    /// Calculate delay for the given attempt number (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_retries {
            return self.max_delay;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        // Overflowing or NaN products saturate at the cap.
        Duration::try_from_secs_f64(delay_secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Dead letter queue entry for a task that exhausted its retries.
#[derive(Debug, Clone)]
pub struct DeadLetterEntry<T> {
    /// The failed job.
    pub job: T,
    /// Number of attempts made.
    pub attempts: u32,
    /// Last error message.
    pub last_error: String,
    /// Timestamp of last failure.
    pub failed_at: chrono::DateTime<chrono::Utc>,
}

impl<T> DeadLetterEntry<T> {
    /// Create a new dead letter entry.
    pub fn new(job: T, attempts: u32, error: String) -> Self {
        Self {
            job,
            attempts,
            last_error: error,
            failed_at: chrono::Utc::now(),
        }
    }
}

/// In-memory record of tasks that could not be delivered.
///
/// Entries only carry the task id; the task itself stays in task storage.
#[derive(Debug, Default)]
pub struct DeadLetterQueue {
    entries: RwLock<Vec<DeadLetterEntry<TaskId>>>,
}

impl DeadLetterQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, entry: DeadLetterEntry<TaskId>) {
        self.entries.write().await.push(entry);
    }

    /// Snapshot of all entries, oldest first.
    pub async fn list(&self) -> Vec<DeadLetterEntry<TaskId>> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
