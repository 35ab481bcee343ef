use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{CacheFieldConfig, DerivationRegistry};
use crate::derive::Derivation;
use crate::error::CacheFieldResult;
use crate::queue::Deferrer;
use crate::rule::CacheFieldRule;
use crate::store::Collection;
use crate::trigger::{insert_hook, update_hook};

/// Keep `cached_field` on every document of `collection` in sync with
/// `derive(document, watched_fields)`
///
/// Installs one post-insert and one post-update hook. Recomputes run on
/// `deferrer`, after the triggering write has returned to its caller, so the
/// cached field is only eventually correct.
///
/// `derive: None` uses the default joiner, which joins the watched fields'
/// values with `", "`.
///
/// # Errors
///
/// `Configuration` when a field name is invalid or the cached field is one of
/// its own watched fields. Nothing is installed in that case.
pub fn register_cache_field<C, I, S>(
    collection: &Arc<C>,
    deferrer: Arc<dyn Deferrer>,
    cached_field: &str,
    watched_fields: I,
    derive: Option<Derivation>,
) -> CacheFieldResult<Arc<CacheFieldRule>>
where
    C: Collection,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let rule = Arc::new(CacheFieldRule::new(cached_field, watched_fields, derive)?);
    install_triggers(collection, deferrer, &rule);
    Ok(rule)
}

/// Register a rule from a declaration (see [`CacheFieldConfig`])
pub fn register_from_config<C: Collection>(
    collection: &Arc<C>,
    deferrer: Arc<dyn Deferrer>,
    declaration: &Value,
    registry: &DerivationRegistry,
) -> CacheFieldResult<Arc<CacheFieldRule>> {
    let config = CacheFieldConfig::from_value(declaration)?;
    let derive = config.resolve_derive(registry)?;
    register_cache_field(collection, deferrer, &config.cached_field, config.watched_fields, derive)
}

/// Attach the insert and update hooks of an already validated rule
pub fn install_triggers<C: Collection>(
    collection: &Arc<C>,
    deferrer: Arc<dyn Deferrer>,
    rule: &Arc<CacheFieldRule>,
) {
    if rule.watched_fields().is_empty() {
        warn!(
            collection = collection.name(),
            cached_field = rule.cached_field(),
            "cached field has no watched fields and will never be recomputed"
        );
    }

    let weak = Arc::downgrade(collection);
    collection.after_insert(insert_hook(weak.clone(), Arc::clone(&deferrer), Arc::clone(rule)));
    collection.after_update(update_hook(weak, deferrer, Arc::clone(rule)));

    info!(
        collection = collection.name(),
        cached_field = rule.cached_field(),
        watched_fields = ?rule.watched_fields(),
        derive = rule.derivation().name(),
        "installed cached field triggers"
    );
}

/// Builder form of [`register_cache_field`]
///
/// ```rust
/// use std::sync::Arc;
/// use cachefield::{CacheFieldBuilder, Derivation, MemoryCollection, QueueDeferrer};
///
/// let people = Arc::new(MemoryCollection::new("people"));
/// let queue = Arc::new(QueueDeferrer::default());
///
/// let rule = CacheFieldBuilder::new("fullName")
///     .watch(["first", "last"])
///     .derive(Derivation::joiner_with_glue(" "))
///     .install(&people, queue)
///     .unwrap();
///
/// assert_eq!(rule.watched_fields(), &["first", "last"]);
/// ```
#[derive(Debug, Clone)]
pub struct CacheFieldBuilder {
    cached_field: String,
    watched_fields: Vec<String>,
    derive: Option<Derivation>,
}

impl CacheFieldBuilder {
    pub fn new(cached_field: impl Into<String>) -> Self {
        Self {
            cached_field: cached_field.into(),
            watched_fields: Vec::new(),
            derive: None,
        }
    }

    pub fn watch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn derive(mut self, derive: impl Into<Derivation>) -> Self {
        self.derive = Some(derive.into());
        self
    }

    pub fn install<C: Collection>(
        self,
        collection: &Arc<C>,
        deferrer: Arc<dyn Deferrer>,
    ) -> CacheFieldResult<Arc<CacheFieldRule>> {
        register_cache_field(
            collection,
            deferrer,
            &self.cached_field,
            self.watched_fields,
            self.derive,
        )
    }
}
