//! Cached fields for document collections
//!
//! A cached field holds a value derived from other fields of the same
//! document (a `fullName` built from `first` and `last`, a search label, ...).
//! Registering one installs two post-write hooks on the collection; whenever
//! an insert or update touches a watched field, the value is re-derived and
//! written back with a single-field update, after the triggering write has
//! returned.
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use cachefield::{register_cache_field, Derivation, MemoryCollection, Modifier, QueueDeferrer};
//!
//! let people = Arc::new(MemoryCollection::new("people"));
//! let queue = Arc::new(QueueDeferrer::default());
//!
//! register_cache_field(
//!     &people,
//!     queue.clone(),
//!     "fullName",
//!     ["first", "last"],
//!     Some(Derivation::joiner_with_glue(" ")),
//! )
//! .unwrap();
//!
//! let fields = json!({"first": "Ada", "last": "Lovelace"});
//! let id = people.insert(None, fields.as_object().unwrap().clone()).unwrap();
//! queue.flush().unwrap();
//! assert_eq!(people.find_one(&id).unwrap().get("fullName"), Some(json!("Ada Lovelace")));
//!
//! people.modify(None, &id, &Modifier::new().set("first", json!("Grace"))).unwrap();
//! queue.flush().unwrap();
//! assert_eq!(people.find_one(&id).unwrap().get("fullName"), Some(json!("Grace Lovelace")));
//! ```

pub mod config;
pub mod dependency;
pub mod derive;
pub mod document;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod queue;
pub mod refresh;
pub mod rule;
pub mod store;
pub mod validation;
mod trigger;


pub use config::{CacheFieldConfig, DerivationRegistry};
pub use dependency::{register_cache_field, register_from_config, CacheFieldBuilder, ChangeSet};
pub use derive::{DeriveError, Derivation, FieldsJoiner};
pub use document::{ActorId, Document, DocumentId, FieldUpdate};
pub use error::{CacheFieldError, CacheFieldResult, ErrorKind};
pub use memory::{MemoryCollection, Modifier};
pub use metrics::RuleStats;
pub use queue::{DeferredTask, Deferrer, FailureReporter, QueueDeferrer, TaskFailure, TokioDeferrer};
pub use refresh::{recompute_if_needed, RecomputeOutcome};
pub use rule::CacheFieldRule;
pub use store::{Collection, InsertHook, StoreError, StoreResult, UpdateHook};

/// Version of the cachefield crate
pub fn cachefield_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
