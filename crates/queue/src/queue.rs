//! FIFO hand-off of task ids from producers to workers.
//!
//! Tasks move through three states: waiting (inside the bounded channel),
//! in progress (claimed by [`TaskQueue::working`]) and finished (released by
//! [`TaskQueue::finish`]).

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::task::TaskId;

/// Task queue with waiting / in-progress / finished lifecycle tracking.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Hand a task id to the workers. Waits while the queue is full.
    ///
    /// Returns `false` if the queue no longer accepts work.
    async fn enqueue(&self, id: TaskId) -> bool;

    /// Wait for the next task id and mark it in progress.
    ///
    /// Returns `None` once the queue is closed and drained. Cancel safe: an
    /// id taken off the queue is already in progress when the call returns.
    async fn working(&self) -> Option<TaskId>;

    /// Snapshot of the ids currently in progress.
    async fn list_working(&self) -> HashSet<TaskId>;

    /// Move an in-progress id to finished.
    ///
    /// Returns `false` and changes nothing if `id` is not in progress.
    async fn finish(&self, id: &TaskId) -> bool;

    /// Snapshot of the finished ids.
    async fn list_finished(&self) -> HashSet<TaskId>;
}

/// In-memory queue backed by a bounded channel.
///
/// The channel bound is the backpressure point: with capacity 1 a second
/// `enqueue` waits until a worker claims the first id. The in-progress and
/// finished sets are guarded separately and never held across an await.
pub struct MemoryTaskQueue {
    sender: mpsc::Sender<TaskId>,
    receiver: Mutex<mpsc::Receiver<TaskId>>,
    in_progress: RwLock<HashSet<TaskId>>,
    finished: RwLock<HashSet<TaskId>>,
    closed: CancellationToken,
}

impl MemoryTaskQueue {
    /// Create a queue whose channel holds `capacity` waiting ids (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            in_progress: RwLock::new(HashSet::new()),
            finished: RwLock::new(HashSet::new()),
            closed: CancellationToken::new(),
        }
    }

    /// Stop accepting work.
    ///
    /// Pending and future `enqueue` calls return `false`. Workers keep
    /// receiving ids already in the channel, then `working` returns `None`.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Default for MemoryTaskQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, id: TaskId) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }

        tokio::select! {
            biased;
            () = self.closed.cancelled() => false,
            sent = self.sender.send(id) => sent.is_ok(),
        }
    }

    async fn working(&self) -> Option<TaskId> {
        let id = {
            let mut receiver = self.receiver.lock().await;
            tokio::select! {
                biased;
                id = receiver.recv() => id,
                () = self.closed.cancelled() => {
                    // Drain what is already buffered before reporting closed.
                    receiver.try_recv().ok()
                }
            }
        }?;

        self.in_progress
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        Some(id)
    }

    async fn list_working(&self) -> HashSet<TaskId> {
        self.in_progress
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn finish(&self, id: &TaskId) -> bool {
        let removed = self
            .in_progress
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if !removed {
            return false;
        }

        self.finished
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        true
    }

    async fn list_finished(&self) -> HashSet<TaskId> {
        self.finished
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
