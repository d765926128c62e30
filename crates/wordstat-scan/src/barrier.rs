//! The point the orchestrator blocks on until every worker has exited.

use wordstat_core::ScanError;

use crate::worker::{Worker, WorkerSummary};

/// Blocks until all N workers have signalled completion.
///
/// A worker signals completion by returning from its thread; its summary is
/// its published, final line count. After [`wait`](Self::wait) returns, every
/// aggregator update made by the workers is visible to the caller.
pub struct CompletionBarrier {
    pending: Vec<Worker>,
}

impl CompletionBarrier {
    pub fn new(workers: Vec<Worker>) -> Self {
        Self { pending: workers }
    }

    /// Number of workers that have not been waited on yet.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every worker, even if one of them failed.
    pub fn wait(self) -> Result<Vec<WorkerSummary>, ScanError> {
        let mut summaries = Vec::with_capacity(self.pending.len());
        let mut interrupted = None;

        for worker in self.pending {
            match worker.join() {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    interrupted.get_or_insert(err);
                }
            }
        }

        match interrupted {
            Some(err) => Err(err),
            None => Ok(summaries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_barrier_is_satisfied() {
        let barrier = CompletionBarrier::new(Vec::new());
        assert_eq!(barrier.remaining(), 0);
        assert!(barrier.wait().unwrap().is_empty());
    }
}
