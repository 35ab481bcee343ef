//! Documents as the trigger sees them
//!
//! A document is an identifier plus a JSON object of fields. The trigger only
//! ever enumerates field names (for inserts) and reads the fields a derive
//! function asks for, so the representation stays deliberately thin.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ID_FIELD;

/// Stable identifier of a document within its collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of whoever performed a write. Passed through, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored document: `_id` plus its fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: DocumentId,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, fields: Map<String, Value>) -> Self {
        let mut fields = fields;
        fields.remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Read a field. `_id` is answered from the identifier.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return Some(Value::String(self.id.to_string()));
        }
        self.fields.get(field).cloned()
    }

    /// Every field name present on the document, `_id` first
    pub fn field_names(&self) -> impl Iterator<Item = &str> + '_ {
        std::iter::once(ID_FIELD).chain(self.fields.keys().map(String::as_str))
    }
}

/// A scoped update that sets exactly one field
///
/// There is no way to build one with more than one key in its set clause:
/// the trigger must never touch any field other than the cached one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldUpdate {
    #[serde(rename = "$set")]
    set: Map<String, Value>,
}

impl FieldUpdate {
    pub fn set(field: impl Into<String>, value: Value) -> Self {
        let mut set = Map::with_capacity(1);
        set.insert(field.into(), value);
        Self { set }
    }

    pub fn set_clause(&self) -> &Map<String, Value> {
        &self.set
    }

    /// The single `(field, value)` pair being written
    pub fn field(&self) -> Option<(&str, &Value)> {
        self.set.iter().next().map(|(k, v)| (k.as_str(), v))
    }
}
