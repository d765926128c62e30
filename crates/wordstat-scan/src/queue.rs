//! Shared work queue between the walker and the workers.
//!
//! The queue is an unbounded crossbeam channel plus two pieces of shared
//! state that decide when it closes:
//!
//! - the **traversal-complete** flag, raised once by the walker;
//! - the **outstanding** count of tasks that were pushed but not yet finished.
//!
//! Workers block in [`WorkQueue::pop`] while the queue is empty. The queue is
//! closed exactly when both conditions hold (no outstanding task and traversal
//! complete), which wakes every blocked worker with `None`. Whichever side
//! makes the second condition true performs the close, so no worker ever has
//! to poll.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;
use wordstat_core::FileTask;

/// Returned when pushing to a queue that has already been closed.
#[derive(Debug, Error)]
#[error("work queue is closed")]
pub struct QueueClosed(pub FileTask);

/// Counters describing queue traffic.
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total tasks pushed, including retries.
    pub enqueued: AtomicU64,

    /// Total tasks handed to workers.
    pub dequeued: AtomicU64,

    /// Tasks pushed as replacements for failed attempts.
    pub requeued: AtomicU64,
}

impl QueueStats {
    /// Get queue throughput (dequeued tasks)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get number of retry tasks pushed
    pub fn requeue_count(&self) -> u64 {
        self.requeued.load(Ordering::Relaxed)
    }
}

/// Thread-safe FIFO of pending file tasks.
#[derive(Debug)]
pub struct WorkQueue {
    /// Sender side; taken out (dropped) when the queue closes.
    sender: Mutex<Option<Sender<FileTask>>>,

    /// Receiver side, shared by every worker.
    receiver: Receiver<FileTask>,

    /// Tasks pushed and not yet finished.
    outstanding: AtomicUsize,

    /// Set once by the walker; never cleared.
    traversal_complete: AtomicBool,

    stats: QueueStats,
}

impl WorkQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            outstanding: AtomicUsize::new(0),
            traversal_complete: AtomicBool::new(false),
            stats: QueueStats::default(),
        }
    }

    /// Add a task. The task counts as outstanding until [`finish`](Self::finish).
    pub fn push(&self, task: FileTask) -> Result<(), QueueClosed> {
        // Count first so the queue cannot close between send and increment.
        self.outstanding.fetch_add(1, Ordering::SeqCst);

        let sender = self.lock_sender();
        let Some(tx) = sender.as_ref() else {
            drop(sender);
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueClosed(task));
        };

        // The receiver lives as long as `self`, so an unbounded send cannot fail.
        if let Err(err) = tx.send(task) {
            drop(sender);
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueClosed(err.into_inner()));
        }
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Take the next task, blocking while the queue is empty but still open.
    ///
    /// Returns `None` only once the queue is closed and drained, which means
    /// no further task can ever arrive.
    pub fn pop(&self) -> Option<FileTask> {
        let task = self.receiver.recv().ok()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(task)
    }

    /// Take the next task without blocking.
    pub fn try_pop(&self) -> Option<FileTask> {
        let task = self.receiver.try_recv().ok()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(task)
    }

    /// Mark a dequeued task as done.
    pub fn finish(&self, task: FileTask) {
        drop(task);
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1
            && self.traversal_complete.load(Ordering::SeqCst)
        {
            self.close();
        }
    }

    /// Replace a failed task with its retry and finish the failed one.
    ///
    /// The replacement is pushed before the original is finished so the
    /// outstanding count never drops to zero while a retry is pending.
    pub fn requeue(&self, failed: FileTask) -> Result<(), QueueClosed> {
        let result = self.push(failed.retry());
        if result.is_ok() {
            self.stats.requeued.fetch_add(1, Ordering::Relaxed);
        }
        self.finish(failed);
        result
    }

    /// Raise the traversal-complete signal. Later calls have no effect.
    pub fn mark_traversal_complete(&self) {
        if self.traversal_complete.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            self.close();
        }
    }

    /// Check whether the walker has finished producing tasks.
    pub fn is_traversal_complete(&self) -> bool {
        self.traversal_complete.load(Ordering::Acquire)
    }

    /// Check whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock_sender().is_none()
    }

    /// Tasks pushed and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Tasks currently waiting in the channel.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if no task is waiting in the channel.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    fn close(&self) {
        // Dropping the only sender disconnects the channel once it is drained.
        self.lock_sender().take();
    }

    fn lock_sender(&self) -> MutexGuard<'_, Option<Sender<FileTask>>> {
        // Nothing can be left half-updated inside the lock, so poisoning is harmless.
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
