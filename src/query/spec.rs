use bson::{Bson, Document};

use crate::filter::FilterBuilder;
use crate::store::{FindOptions, SortSpec};

/// Accumulated, store-independent description of a query.
///
/// `skip` and `limit` use zero for "unset". An empty `projection` means every field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filter: FilterBuilder,
    pub sort: Vec<SortSpec>,
    pub skip: u64,
    pub limit: u64,
    pub projection: Document,
    /// Requested relation names, in request order.
    pub relations: Vec<String>,
}

impl QuerySpec {
    #[must_use]
    pub fn final_filter(&self) -> Document {
        self.filter.build_final_filter()
    }

    #[must_use]
    pub fn projection(&self) -> Option<&Document> {
        (!self.projection.is_empty()).then_some(&self.projection)
    }

    /// Replaces the projection with inclusions of `fields`.
    pub(crate) fn select<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Document::new();
        for f in fields {
            self.projection.insert(f.into(), Bson::Int32(1));
        }
    }

    pub(crate) fn exclude<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for f in fields {
            self.projection.insert(f.into(), Bson::Int32(0));
        }
    }

    /// Find options for a multi-document fetch.
    #[must_use]
    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            projection: self.projection().cloned(),
            sort: self.sort.clone(),
            skip: (self.skip > 0).then_some(self.skip),
            limit: (self.limit > 0).then_some(self.limit),
        }
    }
}
