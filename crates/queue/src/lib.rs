//! Deferred work for the ferry relay.
//!
//! - **Tasks**: opaque ids and the runnable [`Task`] capability
//! - **Storage**: task id to task lookup
//! - **Queue**: bounded FIFO hand-off with in-progress / finished tracking
//! - **Forward**: single-shot POST of an activity to one subscriber inbox
//! - **Workers**: a pool draining the queue, with optional retry and
//!   a dead letter record

pub mod forward;
pub mod queue;
pub mod retry;
pub mod storage;
pub mod task;
pub mod workers;

pub use forward::{ACTIVITY_CONTENT_TYPE, DeliveryError, ForwardTask, delivery_client};
pub use queue::{MemoryTaskQueue, TaskQueue};
pub use retry::{DeadLetterEntry, DeadLetterQueue, RetryConfig};
pub use storage::{MemoryTaskStorage, TaskStorage};
pub use task::{Task, TaskError, TaskId};
pub use workers::{WorkerContext, WorkerPool, forward_worker};
