//! Forward workers: claim task ids, run the stored task, record the outcome.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::queue::TaskQueue;
use crate::retry::{DeadLetterEntry, DeadLetterQueue, RetryConfig};
use crate::storage::TaskStorage;
use crate::task::{Task, TaskId};

/// Shared state of every worker in a pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<dyn TaskQueue>,
    pub storage: Arc<dyn TaskStorage>,
    pub retry: RetryConfig,
    pub dead_letters: Arc<DeadLetterQueue>,
}

impl WorkerContext {
    /// Create a context with single-shot retry and an empty dead letter queue.
    #[must_use]
    pub fn new(queue: Arc<dyn TaskQueue>, storage: Arc<dyn TaskStorage>) -> Self {
        Self {
            queue,
            storage,
            retry: RetryConfig::default(),
            dead_letters: Arc::new(DeadLetterQueue::new()),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Worker loop.
///
/// Runs until the queue reports closed-and-drained or `shutdown` fires.
/// A task in progress when `shutdown` fires is finished first; only a
/// pending backoff is cut short.
pub async fn forward_worker(worker: usize, ctx: WorkerContext, shutdown: CancellationToken) {
    info!(worker, "Forward worker started");

    loop {
        let id = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            id = ctx.queue.working() => id,
        };
        let Some(id) = id else { break };

        match ctx.storage.get(&id).await {
            Some(task) => run_with_retry(worker, &id, task.as_ref(), &ctx, &shutdown).await,
            None => warn!(worker, task_id = %id, "Task missing from storage"),
        }

        if !ctx.queue.finish(&id).await {
            warn!(worker, task_id = %id, "Task was not in progress when finished");
        }
    }

    info!(worker, "Forward worker stopped");
}

async fn run_with_retry(
    worker: usize,
    id: &TaskId,
    task: &dyn Task,
    ctx: &WorkerContext,
    shutdown: &CancellationToken,
) {
    let mut attempt = 0;

    loop {
        let err = match task.run().await {
            Ok(()) => return,
            Err(e) => e,
        };
        attempt += 1;

        if ctx.retry.should_retry(attempt - 1) && !shutdown.is_cancelled() {
            let delay = ctx.retry.delay_for_attempt(attempt - 1);
            warn!(worker, task_id = %id, attempt, error = %err, ?delay, "Task failed, retrying");

            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(delay) => continue,
            }
        }

        error!(worker, task_id = %id, attempts = attempt, error = %err, "Task failed");
        ctx.dead_letters
            .push(DeadLetterEntry::new(id.clone(), attempt, err.to_string()))
            .await;
        return;
    }
}

/// A fixed set of forward workers sharing one queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn `workers` workers (at least one) on the current runtime.
    #[must_use]
    pub fn spawn(workers: usize, ctx: &WorkerContext) -> Self {
        let shutdown = CancellationToken::new();
        let handles = (0..workers.max(1))
            .map(|n| tokio::spawn(forward_worker(n, ctx.clone(), shutdown.child_token())))
            .collect();

        Self { handles, shutdown }
    }

    /// Number of spawned workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Always `false`; a pool has at least one worker.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Token that stops every worker when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait for every worker to exit without signalling them.
    ///
    /// Workers exit on their own once the queue is closed and drained.
    pub async fn join(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!(error = %e, "Forward worker panicked");
            }
        }
    }

    /// Signal every worker to stop, then wait for them.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.join().await;
    }
}
