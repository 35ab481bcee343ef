use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::document::DocumentId;
use crate::error::CacheFieldError;

/// A deferred recompute that failed
///
/// Nobody retries it and the triggering writer never sees it; it is logged and,
/// if someone subscribed, delivered on the failure channel.
#[derive(Debug)]
pub struct TaskFailure {
    pub cached_field: String,
    pub document_id: DocumentId,
    pub error: CacheFieldError,
    pub occurred_at: DateTime<Utc>,
}

impl TaskFailure {
    pub fn new(cached_field: String, document_id: DocumentId, error: CacheFieldError) -> Self {
        Self {
            cached_field,
            document_id,
            error,
            occurred_at: Utc::now(),
        }
    }
}

/// Where deferred task failures go
#[derive(Debug, Clone, Default)]
pub struct FailureReporter {
    sender: Option<mpsc::UnboundedSender<TaskFailure>>,
}

impl FailureReporter {
    /// Reporter that logs failures and also sends them to the returned receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskFailure>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender: Some(sender) }, receiver)
    }

    /// Reporter that only logs
    pub fn log_only() -> Self {
        Self::default()
    }

    pub fn report(&self, failure: TaskFailure) {
        error!(
            cached_field = %failure.cached_field,
            document_id = %failure.document_id,
            code = failure.error.kind().code(),
            "deferred cached field update failed: {}",
            failure.error
        );

        if let Some(sender) = &self.sender {
            if sender.send(failure).is_err() {
                debug!("failure receiver dropped, failure only logged");
            }
        }
    }
}
