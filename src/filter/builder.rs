use bson::{Bson, Document};
use log::Level;

use super::{Clause, Operator, Predicate};

/// Accumulates conjunctive (AND) and disjunctive (OR) clauses.
///
/// The final filter is always derived from the two lists, never stored:
///
/// * both present: `{"$and": [{merged AND clauses}, {"$or": [...]}]}`
/// * only OR clauses: `{"$or": [...]}`
/// * otherwise: the AND clauses as one flat document, in call order.
///
/// AND clauses are merged with map semantics. A second clause on the same field replaces
/// the first one's value and keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterBuilder {
    conjunctive: Vec<Clause>,
    disjunctive: Vec<Clause>,
}

fn to_bson_vec<I, V>(values: I) -> Vec<Bson>
where
    I: IntoIterator<Item = V>,
    V: Into<Bson>,
{
    values.into_iter().map(Into::into).collect()
}

impl FilterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_conjunctive(&mut self, clause: Clause) -> &mut Self {
        if self.conjunctive.iter().any(|c| c.field == clause.field) {
            crate::diag!(
                Level::Warn,
                "conjunctive clause on `{}` overwrites an earlier clause on the same field",
                clause.field
            );
        }
        self.conjunctive.push(clause);
        self
    }

    pub fn and(&mut self, field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> &mut Self {
        self.push_conjunctive(Clause::new(field, Predicate::Cmp(op, value.into())))
    }

    pub fn and_in<I, V>(&mut self, field: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.push_conjunctive(Clause::new(field, Predicate::In(to_bson_vec(values))))
    }

    pub fn and_not_in<I, V>(&mut self, field: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.push_conjunctive(Clause::new(field, Predicate::NotIn(to_bson_vec(values))))
    }

    /// Appends one OR clause; earlier OR clauses are kept.
    pub fn or(&mut self, field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> &mut Self {
        self.disjunctive.push(Clause::new(field, Predicate::Cmp(op, value.into())));
        self
    }

    pub fn or_in<I, V>(&mut self, field: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.disjunctive.push(Clause::new(field, Predicate::In(to_bson_vec(values))));
        self
    }

    pub fn or_not_in<I, V>(&mut self, field: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.disjunctive.push(Clause::new(field, Predicate::NotIn(to_bson_vec(values))));
        self
    }

    #[must_use]
    pub fn conjunctive(&self) -> &[Clause] {
        &self.conjunctive
    }

    #[must_use]
    pub fn disjunctive(&self) -> &[Clause] {
        &self.disjunctive
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conjunctive.is_empty() && self.disjunctive.is_empty()
    }

    /// AND clauses merged into one document keyed by field. Pure: calling it repeatedly
    /// on unchanged state yields the same document.
    #[must_use]
    pub fn conjunctive_map(&self) -> Document {
        let mut merged = Document::new();
        for clause in &self.conjunctive {
            merged.insert(clause.field.clone(), clause.predicate.to_bson());
        }
        merged
    }

    fn or_array(&self) -> Bson {
        Bson::Array(self.disjunctive.iter().map(|c| Bson::Document(c.to_document())).collect())
    }

    #[must_use]
    pub fn build_final_filter(&self) -> Document {
        match (self.conjunctive.is_empty(), self.disjunctive.is_empty()) {
            (false, false) => {
                let mut or = Document::new();
                or.insert("$or", self.or_array());
                let mut out = Document::new();
                out.insert(
                    "$and",
                    Bson::Array(vec![Bson::Document(self.conjunctive_map()), Bson::Document(or)]),
                );
                out
            }
            (true, false) => {
                let mut out = Document::new();
                out.insert("$or", self.or_array());
                out
            }
            _ => self.conjunctive_map(),
        }
    }
}
