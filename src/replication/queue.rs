//! The task queue shared between producers and the single worker

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::types::{BackupTask, TaskPriority};

/// Priority-aware FIFO queue.
///
/// `outstanding` counts queued plus in-flight tasks so callers can wait for
/// a full drain, not just an empty deque.
pub struct ReplicationQueue {
    tasks: Mutex<VecDeque<BackupTask>>,
    outstanding: AtomicUsize,
    /// Wakes the worker when a task arrives
    arrived: Notify,
    /// Wakes drain waiters when outstanding hits zero
    drained: Notify,
}

impl ReplicationQueue {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            outstanding: AtomicUsize::new(0),
            arrived: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Enqueue a task. High-priority tasks go to the front.
    pub fn push(&self, task: BackupTask) {
        {
            let mut tasks = self.tasks.lock();
            match task.priority {
                TaskPriority::High => tasks.push_front(task),
                TaskPriority::Normal => tasks.push_back(task),
            }
        }
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.arrived.notify_one();
    }

    /// Pop the front task, if any. Only the worker calls this; the task
    /// stays counted in `outstanding` until [`task_done`](Self::task_done).
    pub fn pop(&self) -> Option<BackupTask> {
        self.tasks.lock().pop_front()
    }

    /// Mark the most recently popped task fully processed
    pub fn task_done(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Queued (not yet popped) tasks
    pub fn depth(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Queued plus in-flight tasks
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Wait until a task is available or a push occurs
    pub async fn wait_for_task(&self) {
        let notified = self.arrived.notified();
        if self.depth() > 0 {
            return;
        }
        notified.await;
    }

    /// Wait until every enqueued task has been fully processed
    pub async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ReplicationQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackupTask, TaskPriority};

    fn doc_task(id: &str, priority: TaskPriority) -> BackupTask {
        BackupTask::document(id.to_string(), priority)
    }

    #[test]
    fn fifo_within_normal_priority() {
        let queue = ReplicationQueue::new();
        queue.push(doc_task("a", TaskPriority::Normal));
        queue.push(doc_task("b", TaskPriority::Normal));

        assert_eq!(queue.pop().unwrap().payload_ref(), "a");
        assert_eq!(queue.pop().unwrap().payload_ref(), "b");
    }

    #[test]
    fn high_priority_jumps_the_backlog() {
        let queue = ReplicationQueue::new();
        queue.push(doc_task("a", TaskPriority::Normal));
        queue.push(doc_task("b", TaskPriority::Normal));
        queue.push(BackupTask::configuration_snapshot(
            "config".to_string(),
            vec![],
        ));

        assert_eq!(queue.pop().unwrap().payload_ref(), "config");
        assert_eq!(queue.pop().unwrap().payload_ref(), "a");
    }

    #[test]
    fn outstanding_counts_in_flight_tasks() {
        let queue = ReplicationQueue::new();
        queue.push(doc_task("a", TaskPriority::Normal));
        assert_eq!(queue.depth(), 1);
        assert_eq!(queue.outstanding(), 1);

        let _task = queue.pop().unwrap();
        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.outstanding(), 1);

        queue.task_done();
        assert_eq!(queue.outstanding(), 0);
    }

    #[tokio::test]
    async fn wait_drained_returns_once_empty() {
        let queue = ReplicationQueue::new();
        queue.wait_drained().await; // empty queue returns immediately

        queue.push(doc_task("a", TaskPriority::Normal));
        queue.pop().unwrap();
        queue.task_done();
        queue.wait_drained().await;
    }
}
