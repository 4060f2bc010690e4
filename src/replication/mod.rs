//! Replication queue and worker
//!
//! An ordered work queue of backup tasks drained by a single worker with
//! small inter-task delays. FIFO within a priority class; high-priority
//! tasks jump the backlog.

mod queue;
mod worker;

pub use queue::ReplicationQueue;
pub use worker::{ReplicationWorker, WorkerContext, DEFAULT_TASK_PACING};
