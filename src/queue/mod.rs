//! Deferred execution of cached field recomputes
//!
//! Hooks never recompute inline. They wrap the work in a `DeferredTask` and
//! hand it to a `Deferrer`:
//! - `QueueDeferrer`: in-process FIFO, drained by an explicit `flush()`
//! - `TokioDeferrer`: one blocking-pool task per recompute, fire-and-forget
//! - `FailureReporter`: where failed tasks are logged and published

mod failure;
mod local;
mod spawn;
mod task;

pub use failure::{FailureReporter, TaskFailure};
pub use local::{FlushStats, QueueDeferrer};
pub use spawn::TokioDeferrer;
pub use task::{DeferredTask, Deferrer};
