//! Task workers.

mod forward;

pub use forward::{WorkerContext, WorkerPool, forward_worker};
