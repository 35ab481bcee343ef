use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::trace;

use super::failure::FailureReporter;
use super::task::{DeferredTask, Deferrer};
use crate::error::{CacheFieldError, CacheFieldResult};

/// Runs each deferred task on a tokio runtime, fire-and-forget
///
/// Tasks go to the blocking pool: derive functions and store writes are
/// synchronous and may be slow, and must not stall the runtime's workers.
#[derive(Debug, Clone)]
pub struct TokioDeferrer {
    handle: Handle,
    reporter: FailureReporter,
    in_flight: Arc<AtomicUsize>,
}

impl TokioDeferrer {
    pub fn new(handle: Handle, reporter: FailureReporter) -> Self {
        Self {
            handle,
            reporter,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Use the runtime the caller is running in
    pub fn current(reporter: FailureReporter) -> CacheFieldResult<Self> {
        let handle = Handle::try_current().map_err(|e| {
            CacheFieldError::configuration(
                "deferrer",
                "tokio",
                format!("no tokio runtime available: {}", e),
            )
        })?;
        Ok(Self::new(handle, reporter))
    }

    /// Tasks submitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Holds one slot of the in-flight count until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Deferrer for TokioDeferrer {
    fn defer(&self, task: DeferredTask) {
        let reporter = self.reporter.clone();
        let slot = InFlight::acquire(&self.in_flight);

        trace!(
            cached_field = task.cached_field(),
            document_id = %task.document_id(),
            "spawning deferred task"
        );

        // The join handle is dropped on purpose: nobody waits on the result.
        let _ = self.handle.spawn_blocking(move || {
            let _slot = slot;
            task.execute(&reporter);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use crate::ErrorKind;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tasks_run_in_background() {
        let deferrer = TokioDeferrer::current(FailureReporter::log_only()).unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        deferrer.defer(DeferredTask::new("label", DocumentId::from("d1"), move || {
            let _ = tx.send(());
            Ok(())
        }));

        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("task did not run")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failures_reach_channel() {
        let (reporter, mut failures) = FailureReporter::channel();
        let deferrer = TokioDeferrer::current(reporter).unwrap();

        deferrer.defer(DeferredTask::new("label", DocumentId::from("d9"), || {
            Err(CacheFieldError::Serialization {
                message: "bad".to_string(),
            })
        }));

        let failure = tokio::time::timeout(Duration::from_secs(5), failures.recv())
            .await
            .expect("no failure reported")
            .unwrap();
        assert_eq!(failure.document_id, DocumentId::from("d9"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panicking_task_is_reported_and_released() {
        let (reporter, mut failures) = FailureReporter::channel();
        let deferrer = TokioDeferrer::current(reporter).unwrap();

        deferrer.defer(DeferredTask::new("label", DocumentId::from("d3"), || {
            panic!("derive blew up")
        }));

        let failure = tokio::time::timeout(Duration::from_secs(5), failures.recv())
            .await
            .expect("no failure reported")
            .unwrap();
        assert_eq!(failure.error.kind(), ErrorKind::Panic);

        // The slot is released right after the failure is sent.
        tokio::time::timeout(Duration::from_secs(5), async {
            while deferrer.in_flight() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("in-flight count never returned to zero");
    }

    #[test]
    fn test_current_without_runtime() {
        assert!(TokioDeferrer::current(FailureReporter::log_only()).is_err());
    }
}
