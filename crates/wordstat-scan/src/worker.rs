//! Worker threads that read files and aggregate their tokens.
//!
//! Each worker:
//! - Pulls file tasks from the shared [`WorkQueue`], blocking while it is empty
//! - Reads the file line by line into a private per-file tally
//! - Commits the tally to the [`Aggregator`] only after the whole file was read
//! - Requeues the file (up to the retry cap) when opening or reading fails
//! - Exits once the queue is closed, returning its private line count

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use wordstat_core::{FileTask, ScanError, ScanWarning};

use crate::aggregate::Aggregator;
use crate::barrier::CompletionBarrier;
use crate::progress::ProgressReporter;
use crate::queue::{QueueClosed, WorkQueue};
use crate::reader::ContentReader;
use crate::tokenize::FileTally;

/// What a worker publishes when it exits.
#[derive(Debug, Clone, Default)]
pub struct WorkerSummary {
    /// Worker ID
    pub id: usize,
    /// Lines read from files this worker processed successfully.
    pub lines_read: u64,
    /// Files this worker processed successfully.
    pub files_processed: u64,
    /// Attempts that failed (whether or not they were retried).
    pub failed_attempts: u64,
    /// Files this worker gave up on.
    pub failures: Vec<ScanWarning>,
}

impl WorkerSummary {
    fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Shared state every worker needs.
pub(crate) struct WorkerContext {
    pub queue: Arc<WorkQueue>,
    pub aggregator: Arc<Aggregator>,
    pub reader: Arc<dyn ContentReader>,
    pub progress: ProgressReporter,
    pub max_retries: u32,
}

/// Finishes a dequeued task on drop unless it was handed back for a retry.
///
/// Keeps the outstanding count honest if processing unwinds, so the other
/// workers can still drain the queue and exit.
struct InFlight<'a> {
    queue: &'a WorkQueue,
    task: Option<FileTask>,
}

impl<'a> InFlight<'a> {
    fn new(queue: &'a WorkQueue, task: FileTask) -> Self {
        Self {
            queue,
            task: Some(task),
        }
    }

    fn take(mut self) -> Option<FileTask> {
        self.task.take()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.queue.finish(task);
        }
    }
}

/// A worker thread that processes file tasks.
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: JoinHandle<WorkerSummary>,
}

impl Worker {
    /// Spawn a new worker thread
    pub(crate) fn spawn(id: usize, context: Arc<WorkerContext>) -> Result<Self, ScanError> {
        let handle = thread::Builder::new()
            .name(format!("wordstat-worker-{id}"))
            .spawn(move || worker_loop(id, &context))
            .map_err(|source| ScanError::Spawn {
                name: format!("worker {id}"),
                source,
            })?;

        Ok(Self { id, handle })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish and collect its summary.
    pub fn join(self) -> Result<WorkerSummary, ScanError> {
        self.handle
            .join()
            .map_err(|_| ScanError::interrupted(format!("worker {} panicked", self.id)))
    }
}

/// A fixed-size pool of identical workers.
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing `context`.
    pub(crate) fn spawn(size: usize, context: WorkerContext) -> Result<Self, ScanError> {
        let context = Arc::new(context);
        let workers = (0..size.max(1))
            .map(|id| Worker::spawn(id, Arc::clone(&context)))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(workers = workers.len(), "Worker pool started");
        Ok(Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Barrier satisfied once every worker in the pool has exited.
    pub fn completion(self) -> CompletionBarrier {
        CompletionBarrier::new(self.workers)
    }
}

/// Main worker loop
fn worker_loop(id: usize, context: &WorkerContext) -> WorkerSummary {
    debug!(worker = id, "Worker starting");
    let mut summary = WorkerSummary::new(id);

    while let Some(task) = context.queue.pop() {
        let in_flight = InFlight::new(&context.queue, task);
        let Some(task) = in_flight.task.as_ref() else {
            continue;
        };

        match read_file(task, context.reader.as_ref()) {
            Ok(tally) => {
                trace!(worker = id, path = %task.path.display(), lines = tally.lines, "File processed");
                summary.lines_read += tally.lines;
                summary.files_processed += 1;
                context.aggregator.record_tokens(tally.tokens);
                let processed = context.aggregator.record_file(tally.bytes);
                context.progress.file_done(processed, &context.aggregator, &task.path);
            }
            Err(err) => {
                summary.failed_attempts += 1;
                if let Some(task) = in_flight.take() {
                    handle_failure(id, task, err, context, &mut summary);
                }
            }
        }
    }

    debug!(
        worker = id,
        files = summary.files_processed,
        lines = summary.lines_read,
        "Worker finished"
    );
    summary
}

/// Read a whole file. Nothing is committed if this fails part-way.
fn read_file(task: &FileTask, reader: &dyn ContentReader) -> io::Result<FileTally> {
    let content = reader.open(&task.path)?;
    FileTally::read_from(content)
}

fn handle_failure(
    id: usize,
    task: FileTask,
    err: io::Error,
    context: &WorkerContext,
    summary: &mut WorkerSummary,
) {
    // This attempt no longer counts as an enqueued file.
    context.aggregator.adjust_file_count(-1);

    if !task.can_retry(context.max_retries) {
        warn!(
            worker = id,
            path = %task.path.display(),
            attempts = task.attempts(),
            error = %err,
            "Giving up on file"
        );
        summary
            .failures
            .push(ScanWarning::retry_exhausted(&task.path, &err, task.attempts()));
        context.queue.finish(task);
        return;
    }

    warn!(
        worker = id,
        path = %task.path.display(),
        attempt = task.attempt,
        error = %err,
        "Read failed, requeueing"
    );
    context.aggregator.record_retry();
    context.aggregator.adjust_file_count(1);
    if let Err(QueueClosed(lost)) = context.queue.requeue(task) {
        context.aggregator.adjust_file_count(-1);
        summary
            .failures
            .push(ScanWarning::read_error(&lost.path, &err));
    }
}
