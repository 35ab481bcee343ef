use crate::document::Document;

/// Field names affected by one write event
///
/// Order of first appearance is kept; duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: Vec<String>,
}

impl ChangeSet {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for field in fields {
            let field = field.into();
            if !set.fields.contains(&field) {
                set.fields.push(field);
            }
        }
        set
    }

    /// Every field of a freshly inserted document counts as changed
    pub fn from_insert(document: &Document) -> Self {
        Self::new(document.field_names())
    }

    /// The changed-field list reported by the store, taken as-is
    pub fn from_update(changed_fields: &[String]) -> Self {
        Self::new(changed_fields.iter().cloned())
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Watched fields present in this change set, in watched order
    pub fn intersect<'a>(&self, watched_fields: &'a [String]) -> Vec<&'a str> {
        watched_fields
            .iter()
            .filter(|w| self.contains(w))
            .map(String::as_str)
            .collect()
    }

    pub fn intersects(&self, watched_fields: &[String]) -> bool {
        watched_fields.iter().any(|w| self.contains(w))
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn watched(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_insert_change_set_is_all_fields() {
        let doc = Document::new("d1", json!({"a": 1, "b": 2}).as_object().unwrap().clone());
        let changes = ChangeSet::from_insert(&doc);

        assert_eq!(changes.fields(), &["_id", "a", "b"]);
        assert!(changes.intersects(&watched(&["b"])));
    }

    #[test]
    fn test_update_change_set_dedup() {
        let changes = ChangeSet::from_update(&watched(&["first", "first", "age"]));
        assert_eq!(changes.len(), 2);
        assert!(changes.contains("age"));
    }

    #[test]
    fn test_intersect_keeps_watched_order() {
        let changes: ChangeSet = ["z", "last", "first"].into_iter().collect();
        let w = watched(&["first", "middle", "last"]);
        assert_eq!(changes.intersect(&w), vec!["first", "last"]);
    }

    #[test]
    fn test_disjoint_change_set() {
        let changes = ChangeSet::new(["unrelatedField"]);
        let w = watched(&["first", "last"]);
        assert!(!changes.intersects(&w));
        assert!(changes.intersect(&w).is_empty());
    }

    #[test]
    fn test_empty_watch_never_matches() {
        let changes = ChangeSet::new(["a", "b"]);
        assert!(!changes.intersects(&[]));
    }
}
