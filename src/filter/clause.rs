use bson::{Bson, Document, doc};

use super::Operator;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Cmp(Operator, Bson),
    In(Vec<Bson>),
    NotIn(Vec<Bson>),
}

impl Predicate {
    /// Store representation of the predicate's right-hand side.
    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Cmp(op, value) => match op.store_key() {
                None => value.clone(),
                Some(key) => {
                    let mut d = Document::new();
                    d.insert(key, value.clone());
                    Bson::Document(d)
                }
            },
            Self::In(values) => Bson::Document(doc! { "$in": values.clone() }),
            Self::NotIn(values) => Bson::Document(doc! { "$nin": values.clone() }),
        }
    }
}

/// One field predicate of a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub predicate: Predicate,
}

impl Clause {
    pub fn new(field: impl Into<String>, predicate: Predicate) -> Self {
        Self { field: field.into(), predicate }
    }

    /// The clause as a single-field document, e.g. `{"age": {"$gt": 30}}`.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut d = Document::new();
        d.insert(self.field.clone(), self.predicate.to_bson());
        d
    }
}
