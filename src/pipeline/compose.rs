use bson::{Bson, Document, doc};
use log::Level;

use super::relation::{Cardinality, RelationDescriptor, RelationSet};
use crate::config::RelationPolicy;
use crate::diag;
use crate::errors::{OdmError, Result};
use crate::query::QuerySpec;
use crate::store::{FindOptions, sort_document};

/// Whether a fetch wants one document or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieval {
    One,
    Many,
}

/// What a fetch sends to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionPlan {
    Find { filter: Document, options: FindOptions },
    Aggregate { pipeline: Vec<Document> },
}

impl ExecutionPlan {
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate { .. })
    }

    /// The plan as a single document, for display.
    #[must_use]
    pub fn to_document(&self) -> Document {
        match self {
            Self::Find { filter, options } => {
                let mut find = Document::new();
                find.insert("filter", filter.clone());
                if let Some(p) = &options.projection {
                    find.insert("projection", p.clone());
                }
                if !options.sort.is_empty() {
                    find.insert("sort", sort_document(&options.sort));
                }
                if let Some(n) = options.skip {
                    find.insert("skip", count_bson(n));
                }
                if let Some(n) = options.limit {
                    find.insert("limit", count_bson(n));
                }
                doc! { "find": find }
            }
            Self::Aggregate { pipeline } => {
                let stages: Vec<Bson> = pipeline.iter().cloned().map(Bson::Document).collect();
                doc! { "aggregate": stages }
            }
        }
    }
}

fn count_bson(n: u64) -> Bson {
    i64::try_from(n).map_or(Bson::Int64(i64::MAX), Bson::Int64)
}

fn lookup_stages(d: &RelationDescriptor, out: &mut Vec<Document>) {
    out.push(doc! {
        "$lookup": {
            "from": d.from.as_str(),
            "localField": d.local_field.as_str(),
            "foreignField": d.foreign_field.as_str(),
            "as": d.alias.as_str(),
        }
    });
    if d.cardinality == Cardinality::One {
        out.push(doc! {
            "$unwind": {
                "path": format!("${}", d.alias),
                "preserveNullAndEmptyArrays": true,
            }
        });
    }
}

/// Chooses between a plain find and an aggregation pipeline.
///
/// Without requested relations the plan is a find; a single fetch only carries the
/// filter and projection. With relations the stages are, in order: `$match`, one
/// `$lookup` per relation (plus `$unwind` for `One`), then `$sort`, `$skip`, `$limit`
/// for many, or `$limit: 1` for one, and `$project` last when a projection is set.
///
/// # Errors
/// `OdmError::UnknownRelation` under [`RelationPolicy::Strict`] when a requested name
/// has no descriptor.
pub fn compose(
    spec: &QuerySpec,
    relations: &RelationSet,
    retrieval: Retrieval,
    policy: RelationPolicy,
) -> Result<ExecutionPlan> {
    let filter = spec.final_filter();

    if spec.relations.is_empty() {
        let options = match retrieval {
            Retrieval::One => FindOptions {
                projection: spec.projection().cloned(),
                sort: spec.sort.clone(),
                ..FindOptions::default()
            },
            Retrieval::Many => spec.find_options(),
        };
        return Ok(ExecutionPlan::Find { filter, options });
    }

    let mut pipeline = vec![doc! { "$match": filter }];
    for name in &spec.relations {
        match (relations.get(name), policy) {
            (Some(d), _) => lookup_stages(d, &mut pipeline),
            (None, RelationPolicy::Strict) => return Err(OdmError::UnknownRelation(name.clone())),
            (None, RelationPolicy::Lenient) => {
                diag!(Level::Warn, "relation `{name}` is not configured; skipping join");
            }
        }
    }

    let project = spec.projection().map(|p| doc! { "$project": p.clone() });
    match retrieval {
        Retrieval::Many => {
            if !spec.sort.is_empty() {
                pipeline.push(doc! { "$sort": sort_document(&spec.sort) });
            }
            if spec.skip > 0 {
                pipeline.push(doc! { "$skip": count_bson(spec.skip) });
            }
            if spec.limit > 0 {
                pipeline.push(doc! { "$limit": count_bson(spec.limit) });
            }
            pipeline.extend(project);
        }
        // the forced limit stays the final stage
        Retrieval::One => {
            pipeline.extend(project);
            pipeline.push(doc! { "$limit": 1_i64 });
        }
    }

    log::trace!("composed pipeline with {} stages", pipeline.len());
    Ok(ExecutionPlan::Aggregate { pipeline })
}
