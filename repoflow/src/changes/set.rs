//! Ordered mapping of file path to full new content.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One proposed file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative path as proposed.
    pub path: String,
    /// Full replacement content.
    pub content: String,
}

/// Proposed file writes, kept in the order they were given.
///
/// Serializes as a JSON object of path to content. Later duplicates of a path
/// replace the earlier content in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(Vec<FileChange>);

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the content for `path`.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        let content = content.into();
        match self.0.iter_mut().find(|c| c.path == path) {
            Some(existing) => existing.content = content,
            None => self.0.push(FileChange { path, content }),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is proposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates changes in order.
    pub fn iter(&self) -> impl Iterator<Item = &FileChange> {
        self.0.iter()
    }

    /// Paths in order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.0.iter().map(|c| c.path.clone()).collect()
    }
}

impl<P: Into<String>, C: Into<String>> FromIterator<(P, C)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (path, content) in iter {
            set.insert(path, content);
        }
        set
    }
}

impl Serialize for ChangeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for change in &self.0 {
            map.serialize_entry(&change.path, &change.content)?;
        }
        map.end()
    }
}

struct ChangeSetVisitor;

impl<'de> Visitor<'de> for ChangeSetVisitor {
    type Value = ChangeSet;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping file paths to their full new content")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut set = ChangeSet::new();
        while let Some((path, content)) = access.next_entry::<String, String>()? {
            set.insert(path, content);
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for ChangeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ChangeSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_keeps_order() {
        let set: ChangeSet = serde_json::from_str(r#"{"z.rs": "1", "a.rs": "2", "m/n.rs": "3"}"#).unwrap();
        assert_eq!(set.paths(), vec!["z.rs", "a.rs", "m/n.rs"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"{"z.rs":"1","a.rs":"2","m/n.rs":"3"}"#);
    }

    #[test]
    fn test_non_string_content_is_rejected() {
        assert!(serde_json::from_str::<ChangeSet>(r#"{"a.rs": 5}"#).is_err());
        assert!(serde_json::from_str::<ChangeSet>(r#"["a.rs"]"#).is_err());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let set = ChangeSet::new().with("a", "1").with("b", "2").with("a", "3");
        let items: Vec<_> = set.iter().map(|c| (c.path.as_str(), c.content.as_str())).collect();
        assert_eq!(items, vec![("a", "3"), ("b", "2")]);
    }
}
