//! In-memory document collection
//!
//! A small `Collection` implementation for tests and for embedding where no
//! external store is involved. Updates take Mongo-style `$set`/`$unset`
//! modifiers; the top-level names of the modified paths form the
//! changed-field list that update hooks receive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::trace;

use crate::config::ID_FIELD;
use crate::document::{ActorId, Document, DocumentId, FieldUpdate};
use crate::store::{Collection, InsertHook, StoreError, StoreResult, UpdateHook};

/// A `$set` / `$unset` update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifier {
    set: Map<String, Value>,
    unset: Vec<String>,
}

impl Modifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. Dotted paths address nested objects.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.set.insert(path.into(), value);
        self
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.unset.push(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Top-level field names this modifier touches, without duplicates
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for path in self.set.keys().chain(self.unset.iter()) {
            let top = path.split('.').next().unwrap_or(path).to_string();
            if !names.contains(&top) {
                names.push(top);
            }
        }
        names
    }

    fn apply(&self, fields: &mut Map<String, Value>) -> StoreResult<()> {
        for (path, value) in &self.set {
            set_path(fields, path, value.clone())?;
        }
        for path in &self.unset {
            unset_path(fields, path);
        }
        Ok(())
    }
}

impl From<FieldUpdate> for Modifier {
    fn from(update: FieldUpdate) -> Self {
        Self {
            set: update.set_clause().clone(),
            unset: Vec::new(),
        }
    }
}

/// Documents kept in a `BTreeMap`, with after-insert/after-update observers
pub struct MemoryCollection {
    name: String,
    documents: RwLock<BTreeMap<DocumentId, Map<String, Value>>>,
    insert_hooks: RwLock<Vec<InsertHook>>,
    update_hooks: RwLock<Vec<UpdateHook>>,
    next_id: AtomicU64,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
            insert_hooks: RwLock::new(Vec::new()),
            update_hooks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a document and run the insert hooks
    ///
    /// A string `_id` in `fields` is used as the identifier, otherwise one is
    /// generated.
    pub fn insert(
        &self,
        actor: Option<&ActorId>,
        mut fields: Map<String, Value>,
    ) -> StoreResult<DocumentId> {
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => DocumentId::new(id),
            Some(other) => {
                return Err(StoreError::InvalidUpdate(format!(
                    "{} must be a string, got {}",
                    ID_FIELD, other
                )))
            }
            None => self.generate_id(),
        };

        {
            let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
            if documents.contains_key(&id) {
                return Err(StoreError::DuplicateId(id));
            }
            documents.insert(id.clone(), fields.clone());
        }

        trace!(collection = %self.name, document_id = %id, "inserted document");

        let document = Document::new(id.clone(), fields);
        let hooks = self.insert_hooks.read().unwrap_or_else(PoisonError::into_inner).clone();
        for hook in hooks {
            hook(actor, &document);
        }

        Ok(id)
    }

    /// Apply a modifier and run the update hooks with its changed fields
    pub fn modify(
        &self,
        actor: Option<&ActorId>,
        id: &DocumentId,
        modifier: &Modifier,
    ) -> StoreResult<Document> {
        if modifier.is_empty() {
            return Err(StoreError::InvalidUpdate("empty modifier".to_string()));
        }

        let document = {
            let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
            let fields = documents
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;

            // Apply to a copy so a failed path leaves the stored document untouched.
            let mut updated = fields.clone();
            modifier.apply(&mut updated)?;
            *fields = updated.clone();
            Document::new(id.clone(), updated)
        };

        let changed_fields = modifier.field_names();
        trace!(
            collection = %self.name,
            document_id = %id,
            changed = ?changed_fields,
            "updated document"
        );

        let hooks = self.update_hooks.read().unwrap_or_else(PoisonError::into_inner).clone();
        for hook in hooks {
            hook(actor, &document, &changed_fields);
        }

        Ok(document)
    }

    pub fn remove(&self, id: &DocumentId) -> StoreResult<Document> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .map(|fields| Document::new(id.clone(), fields))
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub fn find_one(&self, id: &DocumentId) -> Option<Document> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|fields| Document::new(id.clone(), fields.clone()))
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered (insert, update) hooks
    pub fn hook_counts(&self) -> (usize, usize) {
        (
            self.insert_hooks.read().unwrap_or_else(PoisonError::into_inner).len(),
            self.update_hooks.read().unwrap_or_else(PoisonError::into_inner).len(),
        )
    }

    fn generate_id(&self) -> DocumentId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        DocumentId::new(format!("{}-{}", self.name, n))
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn after_insert(&self, hook: InsertHook) {
        self.insert_hooks.write().unwrap_or_else(PoisonError::into_inner).push(hook);
    }

    fn after_update(&self, hook: UpdateHook) {
        self.update_hooks.write().unwrap_or_else(PoisonError::into_inner).push(hook);
    }

    fn update(&self, id: &DocumentId, update: FieldUpdate) -> StoreResult<()> {
        self.modify(None, id, &Modifier::from(update)).map(|_| ())
    }
}

fn set_path(fields: &mut Map<String, Value>, path: &str, value: Value) -> StoreResult<()> {
    let mut segments = path.split('.').peekable();
    let mut current = fields;

    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            return Err(StoreError::InvalidUpdate(format!("empty segment in path '{}'", path)));
        }

        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return Ok(());
        }

        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            _ => {
                return Err(StoreError::InvalidUpdate(format!(
                    "cannot set '{}': '{}' is not an object",
                    path, segment
                )))
            }
        };
    }

    Err(StoreError::InvalidUpdate("empty path".to_string()))
}

fn unset_path(fields: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            fields.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(nested)) = fields.get_mut(head) {
                unset_path(nested, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_insert_uses_given_id() {
        let collection = MemoryCollection::new("people");
        let id = collection.insert(None, object(json!({"_id": "p1", "a": 1}))).unwrap();

        assert_eq!(id, DocumentId::from("p1"));
        assert_eq!(collection.find_one(&id).unwrap().get("a"), Some(json!(1)));
    }

    #[test]
    fn test_insert_generates_id_and_rejects_duplicates() {
        let collection = MemoryCollection::new("people");
        let id = collection.insert(None, Map::new()).unwrap();
        assert_eq!(id.as_str(), "people-1");

        let duplicate = collection.insert(None, object(json!({"_id": "people-1"})));
        assert_eq!(duplicate, Err(StoreError::DuplicateId(id)));
    }

    #[test]
    fn test_modifier_field_names_are_top_level() {
        let modifier = Modifier::new()
            .set("address.city", json!("Paris"))
            .set("address.zip", json!("75001"))
            .unset("nickname");
        assert_eq!(modifier.field_names(), vec!["address", "nickname"]);
    }

    #[test]
    fn test_modify_applies_set_and_unset() {
        let collection = MemoryCollection::new("people");
        let id = collection
            .insert(
                None,
                object(json!({"_id": "p1", "nickname": "A", "address": {"city": "London"}})),
            )
            .unwrap();

        let doc = collection
            .modify(
                None,
                &id,
                &Modifier::new().set("address.city", json!("Paris")).unset("nickname"),
            )
            .unwrap();

        assert_eq!(doc.get("address"), Some(json!({"city": "Paris"})));
        assert_eq!(doc.get("nickname"), None);
    }

    #[test]
    fn test_modify_invalid_path_leaves_document() {
        let collection = MemoryCollection::new("people");
        let id = collection.insert(None, object(json!({"_id": "p1", "age": 3}))).unwrap();

        let modifier = Modifier::new().set("name", json!("x")).set("age.years", json!(3));
        let result = collection.modify(None, &id, &modifier);
        assert!(matches!(result, Err(StoreError::InvalidUpdate(_))));
        assert_eq!(collection.find_one(&id).unwrap().get("name"), None);
    }

    #[test]
    fn test_modify_missing_document() {
        let collection = MemoryCollection::new("people");
        let modifier = Modifier::new().set("a", json!(1));
        let result = collection.modify(None, &DocumentId::from("nope"), &modifier);
        assert_eq!(result, Err(StoreError::NotFound(DocumentId::from("nope"))));
    }

    #[test]
    fn test_hooks_receive_post_write_state() {
        let collection = MemoryCollection::new("people");
        let seen: Arc<Mutex<Vec<(String, Vec<String>)>>> = Arc::new(Mutex::new(Vec::new()));

        let inserts = Arc::clone(&seen);
        collection.after_insert(Arc::new(move |actor: Option<&ActorId>, doc: &Document| {
            let who = actor.map_or("anonymous", ActorId::as_str).to_string();
            inserts.lock().unwrap().push((who, doc.field_names().map(String::from).collect()));
        }));

        let updates = Arc::clone(&seen);
        collection.after_update(Arc::new(
            move |_actor: Option<&ActorId>, doc: &Document, changed: &[String]| {
                assert_eq!(doc.get("a"), Some(json!(2)));
                updates.lock().unwrap().push(("update".to_string(), changed.to_vec()));
            },
        ));

        let actor = ActorId::new("u42");
        let id = collection.insert(Some(&actor), object(json!({"_id": "d1", "a": 1}))).unwrap();
        collection.modify(None, &id, &Modifier::new().set("a", json!(2))).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("u42".to_string(), vec!["_id".to_string(), "a".to_string()]));
        assert_eq!(seen[1], ("update".to_string(), vec!["a".to_string()]));
    }

    #[test]
    fn test_scoped_update_reports_single_field() {
        let collection = MemoryCollection::new("people");
        let changed: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changed);
        collection.after_update(Arc::new(
            move |_actor: Option<&ActorId>, _doc: &Document, fields: &[String]| {
                sink.lock().unwrap().extend(fields.iter().cloned());
            },
        ));

        let id = collection.insert(None, object(json!({"_id": "d1", "a": 1}))).unwrap();
        Collection::update(&collection, &id, FieldUpdate::set("label", json!("x"))).unwrap();

        assert_eq!(*changed.lock().unwrap(), vec!["label".to_string()]);
        assert_eq!(collection.find_one(&id).unwrap().get("a"), Some(json!(1)));
    }

    #[test]
    fn test_remove() {
        let collection = MemoryCollection::new("people");
        let id = collection.insert(None, Map::new()).unwrap();
        assert!(collection.remove(&id).is_ok());
        assert!(collection.is_empty());
        assert!(collection.remove(&id).is_err());
    }
}
