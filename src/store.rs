//! Collaborator boundary: the document collection a rule is attached to
//!
//! The trigger needs three things from a store: a post-insert observer, a
//! post-update observer that is told which fields changed, and a scoped
//! single-field update. Everything else about persistence stays on the
//! store's side of this trait.

use std::sync::Arc;

use crate::document::{ActorId, Document, DocumentId, FieldUpdate};

/// Observer called after an insert commits
pub type InsertHook = Arc<dyn Fn(Option<&ActorId>, &Document) + Send + Sync>;

/// Observer called after an update commits, with the post-update document
/// and the names of the fields the update modified
pub type UpdateHook = Arc<dyn Fn(Option<&ActorId>, &Document, &[String]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document '{0}' not found")]
    NotFound(DocumentId),

    #[error("document '{0}' already exists")]
    DuplicateId(DocumentId),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A document collection that cached field rules can be attached to
pub trait Collection: Send + Sync + 'static {
    /// Collection name, used in log output
    fn name(&self) -> &str;

    /// Register an observer for committed inserts
    fn after_insert(&self, hook: InsertHook);

    /// Register an observer for committed updates
    fn after_update(&self, hook: UpdateHook);

    /// Apply a scoped update to one document
    ///
    /// A store that reports updates to its observers must report this one
    /// too, with the updated field as the changed-field list.
    fn update(&self, id: &DocumentId, update: FieldUpdate) -> StoreResult<()>;
}
