use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::failure::FailureReporter;
use super::task::{DeferredTask, Deferrer};
use crate::config::MAX_FLUSH_ROUNDS;
use crate::error::{CacheFieldError, CacheFieldResult};

/// In-process FIFO of deferred tasks, drained explicitly with [`flush`]
///
/// Suited to hosts that have a natural "after the write" point of their own
/// (end of a request, end of a batch) and to tests that need to observe the
/// state before and after deferred work runs.
///
/// [`flush`]: QueueDeferrer::flush
#[derive(Debug)]
pub struct QueueDeferrer {
    pending: Mutex<VecDeque<DeferredTask>>,
    reporter: FailureReporter,
    max_rounds: usize,
}

/// What one flush did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub executed: usize,
    pub failed: usize,
    pub rounds: usize,
}

impl Default for QueueDeferrer {
    fn default() -> Self {
        Self::new(FailureReporter::log_only())
    }
}

impl QueueDeferrer {
    pub fn new(reporter: FailureReporter) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            reporter,
            max_rounds: MAX_FLUSH_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every pending task without running it
    pub fn clear(&self) -> usize {
        let mut pending = self.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    /// Run pending tasks until the queue is empty
    ///
    /// Tasks run in submission order. A cached write made by one task can
    /// trigger other rules, whose tasks land back in the queue; each such
    /// generation is one round. Task failures, panics included, go to the
    /// reporter and do not stop the flush.
    ///
    /// # Errors
    ///
    /// `FlushDepthExceeded` when more than `max_rounds` rounds are needed.
    /// The remaining tasks are discarded.
    pub fn flush(&self) -> CacheFieldResult<FlushStats> {
        let mut stats = FlushStats::default();

        loop {
            // The lock is released before running anything: tasks enqueue
            // follow-up work through `defer`.
            let batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                break;
            }

            stats.rounds += 1;
            if stats.rounds > self.max_rounds {
                let dropped = batch.len() + self.clear();
                debug!(dropped, "discarding tasks after flush depth exceeded");
                return Err(CacheFieldError::FlushDepthExceeded {
                    max_rounds: self.max_rounds,
                    processed: stats.executed,
                });
            }

            debug!(round = stats.rounds, tasks = batch.len(), "flushing deferred tasks");

            for task in batch {
                stats.executed += 1;
                if !task.execute(&self.reporter) {
                    stats.failed += 1;
                }
            }
        }

        if stats.executed > 0 {
            info!(
                executed = stats.executed,
                failed = stats.failed,
                rounds = stats.rounds,
                "flushed deferred cached field updates"
            );
        }

        Ok(stats)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DeferredTask>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Deferrer for QueueDeferrer {
    fn defer(&self, task: DeferredTask) {
        self.lock().push_back(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use crate::error::testing::{assert_error_kind, assert_task_failure};
    use crate::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>) -> DeferredTask {
        let counter = Arc::clone(counter);
        DeferredTask::new("label", DocumentId::from("d1"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_defer_does_not_run_inline() {
        let queue = QueueDeferrer::default();
        let counter = Arc::new(AtomicUsize::new(0));

        queue.defer(counting_task(&counter));
        queue.defer(counting_task(&counter));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(queue.len(), 2);

        let stats = queue.flush().unwrap();
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.rounds, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_flush_empty_queue() {
        let queue = QueueDeferrer::default();
        assert_eq!(queue.flush().unwrap(), FlushStats::default());
    }

    #[test]
    fn test_failures_are_reported_not_returned() {
        let (reporter, mut failures) = FailureReporter::channel();
        let queue = QueueDeferrer::new(reporter);

        queue.defer(DeferredTask::new("label", DocumentId::from("d1"), || {
            Err(CacheFieldError::Serialization {
                message: "bad".to_string(),
            })
        }));

        let stats = queue.flush().unwrap();
        assert_eq!(stats.failed, 1);

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.document_id, DocumentId::from("d1"));
    }

    #[test]
    fn test_panicking_task_does_not_drop_rest_of_batch() {
        let (reporter, mut failures) = FailureReporter::channel();
        let queue = QueueDeferrer::new(reporter);
        let counter = Arc::new(AtomicUsize::new(0));

        queue.defer(DeferredTask::new("label", DocumentId::from("bad"), || {
            panic!("derive blew up")
        }));
        queue.defer(counting_task(&counter));

        let stats = queue.flush().unwrap();
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.document_id, DocumentId::from("bad"));
        assert_task_failure(&failure, "label", ErrorKind::Panic);
    }

    #[test]
    fn test_tasks_deferred_during_flush_run_in_next_round() {
        let queue = Arc::new(QueueDeferrer::default());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_queue = Arc::clone(&queue);
        let inner_counter = Arc::clone(&counter);
        queue.defer(DeferredTask::new("a", DocumentId::from("d1"), move || {
            inner_queue.defer(counting_task(&inner_counter));
            Ok(())
        }));

        let stats = queue.flush().unwrap();
        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.executed, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runaway_cascade_is_cut_off() {
        fn respawn(queue: Arc<QueueDeferrer>) -> DeferredTask {
            DeferredTask::new("loop", DocumentId::from("d1"), move || {
                let next = respawn(Arc::clone(&queue));
                queue.defer(next);
                Ok(())
            })
        }

        let queue = Arc::new(QueueDeferrer::default().with_max_rounds(5));
        queue.defer(respawn(Arc::clone(&queue)));

        assert_error_kind(queue.flush(), ErrorKind::Queue);
        assert!(queue.is_empty());
    }
}
