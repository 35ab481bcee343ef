//! Post-write hooks: change detection and deferral
//!
//! The store calls these after an insert or update commits:
//! - **Post-insert**: the change set is every field of the new document
//! - **Post-update**: the change set is the changed-field list the store supplies
//!
//! Either way the hook only captures the document and change set and defers
//! the recompute. Hooks run in the writer's call path, so they must be cheap
//! and must not fail.

use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::dependency::ChangeSet;
use crate::document::{ActorId, Document};
use crate::queue::{DeferredTask, Deferrer};
use crate::refresh::recompute_if_needed;
use crate::rule::CacheFieldRule;
use crate::store::{Collection, InsertHook, UpdateHook};

/// Hook for committed inserts
pub(crate) fn insert_hook<C: Collection>(
    collection: Weak<C>,
    deferrer: Arc<dyn Deferrer>,
    rule: Arc<CacheFieldRule>,
) -> InsertHook {
    Arc::new(move |actor: Option<&ActorId>, document: &Document| {
        let changes = ChangeSet::from_insert(document);
        schedule(&collection, deferrer.as_ref(), &rule, actor, document, changes, "insert");
    })
}

/// Hook for committed updates
pub(crate) fn update_hook<C: Collection>(
    collection: Weak<C>,
    deferrer: Arc<dyn Deferrer>,
    rule: Arc<CacheFieldRule>,
) -> UpdateHook {
    Arc::new(
        move |actor: Option<&ActorId>, document: &Document, changed_fields: &[String]| {
            let changes = ChangeSet::from_update(changed_fields);
            schedule(&collection, deferrer.as_ref(), &rule, actor, document, changes, "update");
        },
    )
}

fn schedule<C: Collection>(
    collection: &Weak<C>,
    deferrer: &dyn Deferrer,
    rule: &Arc<CacheFieldRule>,
    actor: Option<&ActorId>,
    document: &Document,
    changes: ChangeSet,
    event: &'static str,
) {
    rule.metrics().record_fired();

    trace!(
        event = event,
        actor = actor.map(ActorId::as_str),
        cached_field = rule.cached_field(),
        document_id = %document.id,
        changed = ?changes.fields(),
        "cached field hook fired"
    );

    let collection = Weak::clone(collection);
    let rule_for_task = Arc::clone(rule);
    let document = document.clone();

    deferrer.defer(DeferredTask::new(
        rule.cached_field(),
        document.id.clone(),
        move || {
            let Some(collection) = collection.upgrade() else {
                debug!(
                    cached_field = rule_for_task.cached_field(),
                    document_id = %document.id,
                    "collection dropped before deferred recompute ran"
                );
                return Ok(());
            };

            recompute_if_needed(collection.as_ref(), &document, &changes, &rule_for_task)
                .map(|_| ())
        },
    ));
}
