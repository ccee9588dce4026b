use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{OdmError, Result};

/// How many foreign documents a relation yields per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// Unwound to a single embedded document; absent when nothing matches.
    One,
    /// Kept as an array; empty when nothing matches.
    Many,
}

/// Join parameters of one named relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescriptor {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    #[serde(rename = "as")]
    pub alias: String,
    pub cardinality: Cardinality,
}

impl RelationDescriptor {
    pub fn new(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        alias: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            alias: alias.into(),
            cardinality,
        }
    }

    pub fn one(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self::new(from, local_field, foreign_field, alias, Cardinality::One)
    }

    pub fn many(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self::new(from, local_field, foreign_field, alias, Cardinality::Many)
    }

    fn validate(&self, name: &str) -> Result<()> {
        let parts = [
            ("from", &self.from),
            ("localField", &self.local_field),
            ("foreignField", &self.foreign_field),
            ("as", &self.alias),
        ];
        if let Some((key, _)) = parts.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(OdmError::InvalidRelation(format!("{name}: `{key}` must not be empty")));
        }
        Ok(())
    }
}

/// Named relation descriptors available to a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationSet {
    entries: HashMap<String, RelationDescriptor>,
}

impl RelationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `name`.
    ///
    /// # Errors
    /// `OdmError::InvalidRelation` when the name or any descriptor field is empty.
    pub fn insert(&mut self, name: impl Into<String>, descriptor: RelationDescriptor) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OdmError::InvalidRelation("relation name must not be empty".into()));
        }
        descriptor.validate(&name)?;
        self.entries.insert(name, descriptor);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    ///
    /// # Errors
    /// Same as `insert`.
    pub fn with(mut self, name: impl Into<String>, descriptor: RelationDescriptor) -> Result<Self> {
        self.insert(name, descriptor)?;
        Ok(self)
    }

    /// Inserts every entry of `map`; stops at the first invalid one.
    ///
    /// # Errors
    /// Same as `insert`.
    pub fn extend<I>(&mut self, map: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, RelationDescriptor)>,
    {
        for (name, descriptor) in map {
            self.insert(name, descriptor)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RelationDescriptor> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_rejected() {
        let mut set = RelationSet::new();
        let err = set.insert("author", RelationDescriptor::one("users", "", "_id", "author")).unwrap_err();
        assert!(matches!(err, OdmError::InvalidRelation(msg) if msg.contains("localField")));
        assert!(set.insert(" ", RelationDescriptor::many("posts", "_id", "author_id", "posts")).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn insert_replaces_existing_name() {
        let set = RelationSet::new()
            .with("author", RelationDescriptor::one("users", "author_id", "_id", "author"))
            .unwrap()
            .with("author", RelationDescriptor::one("people", "author_id", "_id", "author"))
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("author").unwrap().from, "people");
    }
}
