use chrono::{DateTime, Utc};

use crate::dependency::ChangeSet;
use crate::derive::Derivation;
use crate::error::CacheFieldResult;
use crate::metrics::{RuleMetrics, RuleStats};
use crate::validation::{validate_cached_field, validate_watched_fields};

/// A cached field and the fields it is derived from
///
/// Built and validated once at registration, then shared by reference
/// between the rule's insert and update hooks. Never mutated afterwards,
/// apart from its counters.
#[derive(Debug)]
pub struct CacheFieldRule {
    cached_field: String,
    watched_fields: Vec<String>,
    derive: Derivation,
    registered_at: DateTime<Utc>,
    metrics: RuleMetrics,
}

impl CacheFieldRule {
    /// Validate and build a rule. `derive: None` selects the default joiner.
    pub fn new<I, S>(
        cached_field: &str,
        watched_fields: I,
        derive: Option<Derivation>,
    ) -> CacheFieldResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_cached_field(cached_field)?;
        let watched_fields = validate_watched_fields(
            cached_field,
            watched_fields.into_iter().map(Into::into).collect(),
        )?;

        Ok(Self {
            cached_field: cached_field.to_string(),
            watched_fields,
            derive: derive.unwrap_or_else(Derivation::joiner),
            registered_at: Utc::now(),
            metrics: RuleMetrics::default(),
        })
    }

    pub fn cached_field(&self) -> &str {
        &self.cached_field
    }

    pub fn watched_fields(&self) -> &[String] {
        &self.watched_fields
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derive
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Does this write touch any watched field?
    pub fn is_triggered_by(&self, changes: &ChangeSet) -> bool {
        changes.intersects(&self.watched_fields)
    }

    pub fn stats(&self) -> RuleStats {
        self.metrics.snapshot()
    }

    pub(crate) fn metrics(&self) -> &RuleMetrics {
        &self.metrics
    }
}
