//! Derive functions: how a cached value is computed from a document
//!
//! A [`Derivation`] wraps any `Fn(&Document, &[String]) -> Result<Value, DeriveError>`.
//! [`FieldsJoiner`] is the default, used when a rule is registered without one.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::DEFAULT_JOIN_GLUE;
use crate::document::Document;

/// Failure reported by a derive function
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DeriveError(String);

impl DeriveError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

type DeriveFn = dyn Fn(&Document, &[String]) -> Result<Value, DeriveError> + Send + Sync;

/// A named derive function
#[derive(Clone)]
pub struct Derivation {
    name: String,
    func: Arc<DeriveFn>,
}

impl Derivation {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Document, &[String]) -> Result<Value, DeriveError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Wrap an unnamed closure
    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&Document, &[String]) -> Result<Value, DeriveError> + Send + Sync + 'static,
    {
        Self::new("custom", func)
    }

    /// The default derive: join the watched fields with `", "`
    pub fn joiner() -> Self {
        FieldsJoiner::default().into()
    }

    pub fn joiner_with_glue(glue: impl Into<String>) -> Self {
        FieldsJoiner::default().with_glue(glue).into()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn derive(
        &self,
        document: &Document,
        watched_fields: &[String],
    ) -> Result<Value, DeriveError> {
        (self.func)(document, watched_fields)
    }
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derivation").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Concatenates field values into one string
///
/// Missing, `null`, `false` and empty-string values are left out, so a
/// document with only a last name joins to `"Lovelace"` and not `", Lovelace"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsJoiner {
    fields: Option<Vec<String>>,
    glue: String,
}

impl Default for FieldsJoiner {
    fn default() -> Self {
        Self {
            fields: None,
            glue: DEFAULT_JOIN_GLUE.to_string(),
        }
    }
}

impl FieldsJoiner {
    pub fn with_glue(mut self, glue: impl Into<String>) -> Self {
        self.glue = glue.into();
        self
    }

    /// Join these fields instead of the rule's watched fields
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn join(&self, document: &Document, watched_fields: &[String]) -> Value {
        let fields = self.fields.as_deref().unwrap_or(watched_fields);

        let parts: Vec<String> = fields
            .iter()
            .filter_map(|field| document.get(field))
            .filter_map(render_part)
            .collect();

        Value::String(parts.join(&self.glue))
    }
}

impl From<FieldsJoiner> for Derivation {
    fn from(joiner: FieldsJoiner) -> Self {
        Derivation::new("join", move |doc, watched| Ok(joiner.join(doc, watched)))
    }
}

fn render_part(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
