use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use super::failure::{FailureReporter, TaskFailure};
use crate::document::DocumentId;
use crate::error::{CacheFieldError, CacheFieldResult};

/// Accepts deferred work and runs it outside the caller's stack
///
/// `defer` must not run the task inline: the write that spawned it has to
/// return to its caller first. There is no return channel; failures go to
/// the deferrer's [`FailureReporter`].
pub trait Deferrer: Send + Sync {
    fn defer(&self, task: DeferredTask);
}

/// One recompute scheduled by a hook
pub struct DeferredTask {
    cached_field: String,
    document_id: DocumentId,
    work: Box<dyn FnOnce() -> CacheFieldResult<()> + Send>,
}

impl DeferredTask {
    pub fn new<F>(cached_field: impl Into<String>, document_id: DocumentId, work: F) -> Self
    where
        F: FnOnce() -> CacheFieldResult<()> + Send + 'static,
    {
        Self {
            cached_field: cached_field.into(),
            document_id,
            work: Box::new(work),
        }
    }

    pub fn cached_field(&self) -> &str {
        &self.cached_field
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Run the task, handing any failure to `reporter`
    ///
    /// A panic inside the task is caught and reported as
    /// [`CacheFieldError::Panicked`]; it never unwinds into the deferrer, so
    /// the other pending tasks still run. Returns whether the task succeeded.
    pub fn execute(self, reporter: &FailureReporter) -> bool {
        let Self {
            cached_field,
            document_id,
            work,
        } = self;

        let error = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => return true,
            Ok(Err(error)) => error,
            Err(payload) => CacheFieldError::Panicked {
                cached_field: cached_field.clone(),
                document_id: document_id.clone(),
                message: panic_message(payload.as_ref()),
            },
        };

        reporter.report(TaskFailure::new(cached_field, document_id, error));
        false
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTask")
            .field("cached_field", &self.cached_field)
            .field("document_id", &self.document_id)
            .finish_non_exhaustive()
    }
}
