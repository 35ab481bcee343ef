//! Recompute-and-Write: refresh one cached field on one document
//!
//! Called from a deferred task with the document as the triggering write left
//! it and the fields that write changed.
//!
//! ## Flow
//!
//! 1. Intersect the change set with the rule's watched fields
//! 2. Nothing in common: done, no derive call and no write
//! 3. Otherwise derive the new value from the document
//! 4. Issue a scoped update setting only the cached field
//!
//! The update is reported back through the store's update hooks with a
//! change set of just the cached field. Since the cached field is never one of
//! its own watched fields, the rule stops there.

use serde_json::Value;
use tracing::debug;

use crate::dependency::ChangeSet;
use crate::document::{Document, FieldUpdate};
use crate::error::{CacheFieldError, CacheFieldResult};
use crate::rule::CacheFieldRule;
use crate::store::Collection;

/// Result of [`recompute_if_needed`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecomputeOutcome {
    /// No watched field changed
    Skipped,
    /// The cached field was written with this value
    Written { value: Value },
}

/// Recompute and write `rule`'s cached field if `changes` touch a watched field
pub fn recompute_if_needed<C>(
    collection: &C,
    document: &Document,
    changes: &ChangeSet,
    rule: &CacheFieldRule,
) -> CacheFieldResult<RecomputeOutcome>
where
    C: Collection + ?Sized,
{
    let matched = changes.intersect(rule.watched_fields());
    if matched.is_empty() {
        rule.metrics().record_skipped();
        return Ok(RecomputeOutcome::Skipped);
    }

    debug!(
        collection = collection.name(),
        cached_field = rule.cached_field(),
        document_id = %document.id,
        matched = ?matched,
        "recomputing cached field"
    );

    let value = rule
        .derivation()
        .derive(document, rule.watched_fields())
        .map_err(|e| {
            rule.metrics().record_derive_failure();
            CacheFieldError::Derivation {
                cached_field: rule.cached_field().to_string(),
                document_id: document.id.clone(),
                reason: e.to_string(),
            }
        })?;

    collection
        .update(&document.id, FieldUpdate::set(rule.cached_field(), value.clone()))
        .map_err(|source| {
            rule.metrics().record_write_failure();
            CacheFieldError::Write {
                cached_field: rule.cached_field().to_string(),
                document_id: document.id.clone(),
                source,
            }
        })?;

    rule.metrics().record_written();
    Ok(RecomputeOutcome::Written { value })
}
