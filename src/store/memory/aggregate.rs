//! Pipeline execution for the reference store.

use bson::{Bson, Document};
use std::collections::HashMap;

use super::filter::{compare_docs, eval_filter, get_path, matches_value, parse_filter, truthy};
use super::ops::{apply_projection, set_path, unset_path};
use crate::errors::StoreError;
use crate::store::{Namespace, Order, SortSpec, StoreResult};

pub(crate) type Collections = HashMap<Namespace, Vec<Document>>;

fn count_arg(stage: &str, v: &Bson) -> StoreResult<usize> {
    let n = match v {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(d) if d.fract() == 0.0 => *d as i64,
        _ => return Err(StoreError::Command(format!("{stage} requires an integer"))),
    };
    usize::try_from(n).map_err(|_| StoreError::Command(format!("{stage} must be non-negative")))
}

fn str_field<'a>(spec: &'a Document, stage: &str, key: &str) -> StoreResult<&'a str> {
    match spec.get(key) {
        Some(Bson::String(s)) => Ok(s),
        _ => Err(StoreError::Command(format!("{stage} requires string field `{key}`"))),
    }
}

pub(crate) fn parse_sort(spec: &Document) -> StoreResult<Vec<SortSpec>> {
    spec.iter()
        .map(|(field, dir)| {
            let order = match dir {
                Bson::Int32(1) | Bson::Int64(1) => Order::Asc,
                Bson::Int32(-1) | Bson::Int64(-1) => Order::Desc,
                Bson::Double(d) if *d == 1.0 => Order::Asc,
                Bson::Double(d) if *d == -1.0 => Order::Desc,
                _ => return Err(StoreError::Command(format!("invalid sort direction for `{field}`"))),
            };
            Ok(SortSpec::new(field.clone(), order))
        })
        .collect()
}

fn lookup(
    docs: Vec<Document>,
    spec: &Document,
    ns: &Namespace,
    cols: &Collections,
) -> StoreResult<Vec<Document>> {
    let from = str_field(spec, "$lookup", "from")?;
    let local = str_field(spec, "$lookup", "localField")?;
    let foreign = str_field(spec, "$lookup", "foreignField")?;
    let alias = str_field(spec, "$lookup", "as")?;
    let empty = Vec::new();
    let foreign_docs = cols.get(&ns.sibling(from)).unwrap_or(&empty);

    docs.into_iter()
        .map(|mut doc| {
            let key = get_path(&doc, local).cloned().unwrap_or(Bson::Null);
            let joined: Vec<Bson> = foreign_docs
                .iter()
                .filter(|f| {
                    let fv = get_path(f, foreign).unwrap_or(&Bson::Null);
                    match &key {
                        Bson::Array(keys) => keys.iter().any(|k| matches_value(fv, k)),
                        k => matches_value(fv, k),
                    }
                })
                .map(|f| Bson::Document(f.clone()))
                .collect();
            set_path(&mut doc, alias, Bson::Array(joined))?;
            Ok(doc)
        })
        .collect()
}

fn unwind(docs: Vec<Document>, spec: &Bson) -> StoreResult<Vec<Document>> {
    let (path, preserve) = match spec {
        Bson::String(p) => (p.as_str(), false),
        Bson::Document(d) => (
            str_field(d, "$unwind", "path")?,
            d.get("preserveNullAndEmptyArrays").is_some_and(truthy),
        ),
        _ => return Err(StoreError::Command("$unwind requires a path".into())),
    };
    let field = path
        .strip_prefix('$')
        .ok_or_else(|| StoreError::Command(format!("$unwind path `{path}` must start with `$`")))?;

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match get_path(&doc, field).cloned() {
            Some(Bson::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut d = doc.clone();
                    set_path(&mut d, field, item)?;
                    out.push(d);
                }
            }
            Some(Bson::Array(_)) => {
                if preserve {
                    let mut d = doc;
                    unset_path(&mut d, field);
                    out.push(d);
                }
            }
            None | Some(Bson::Null) => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

/// Runs `pipeline` over the documents of `ns`. `cols` is the view the pipeline reads,
/// the committed state or a transaction's working copy.
pub(crate) fn run_pipeline(
    cols: &Collections,
    ns: &Namespace,
    pipeline: &[Document],
) -> StoreResult<Vec<Document>> {
    let mut docs = cols.get(ns).cloned().unwrap_or_default();
    for stage in pipeline {
        let mut entries = stage.iter();
        let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
            return Err(StoreError::Command("a pipeline stage must have exactly one key".into()));
        };
        docs = match (name.as_str(), spec) {
            ("$match", Bson::Document(f)) => {
                let filter = parse_filter(f)?;
                docs.into_iter().filter(|d| eval_filter(d, &filter)).collect()
            }
            ("$lookup", Bson::Document(s)) => lookup(docs, s, ns, cols)?,
            ("$unwind", s) => unwind(docs, s)?,
            ("$sort", Bson::Document(s)) => {
                let sort = parse_sort(s)?;
                docs.sort_by(|a, b| compare_docs(a, b, &sort));
                docs
            }
            ("$skip", n) => docs.into_iter().skip(count_arg("$skip", n)?).collect(),
            ("$limit", n) => {
                let n = count_arg("$limit", n)?;
                if n == 0 {
                    return Err(StoreError::Command("$limit must be positive".into()));
                }
                docs.truncate(n);
                docs
            }
            ("$project", Bson::Document(p)) => {
                docs.iter().map(|d| apply_projection(d, p)).collect::<StoreResult<_>>()?
            }
            ("$match" | "$lookup" | "$sort" | "$project", _) => {
                return Err(StoreError::Command(format!("{name} requires a document")));
            }
            (other, _) => return Err(StoreError::UnsupportedStage(other.to_string())),
        };
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn fixture() -> (Namespace, Collections) {
        let users = Namespace::new("db", "users");
        let mut cols = Collections::new();
        cols.insert(users.clone(), vec![doc! {"_id": 1, "name": "a"}, doc! {"_id": 2, "name": "b"}]);
        cols.insert(
            users.sibling("posts"),
            vec![doc! {"_id": 10, "user_id": 1}, doc! {"_id": 11, "user_id": 1}],
        );
        (users, cols)
    }

    #[test]
    fn lookup_many_keeps_empty_arrays() {
        let (ns, cols) = fixture();
        let pipeline = [
            doc! {"$lookup": {"from": "posts", "localField": "_id", "foreignField": "user_id", "as": "posts"}},
        ];
        let out = run_pipeline(&cols, &ns, &pipeline).unwrap();
        assert_eq!(out[0].get_array("posts").unwrap().len(), 2);
        assert!(out[1].get_array("posts").unwrap().is_empty());
    }

    #[test]
    fn unwind_preserving_drops_empty_field() {
        let docs = vec![doc! {"_id": 1, "u": [{"n": 1}]}, doc! {"_id": 2, "u": []}, doc! {"_id": 3}];
        let out = unwind(docs.clone(), &Bson::Document(doc! {"path": "$u", "preserveNullAndEmptyArrays": true}))
            .unwrap();
        assert_eq!(out, vec![doc! {"_id": 1, "u": {"n": 1}}, doc! {"_id": 2}, doc! {"_id": 3}]);
        let strict = unwind(docs, &Bson::String("$u".into())).unwrap();
        assert_eq!(strict.len(), 1);
    }

    #[test]
    fn sort_skip_limit() {
        let (ns, cols) = fixture();
        let pipeline = [doc! {"$sort": {"name": -1}}, doc! {"$skip": 1_i64}, doc! {"$limit": 1_i64}];
        let out = run_pipeline(&cols, &ns, &pipeline).unwrap();
        assert_eq!(out, vec![doc! {"_id": 1, "name": "a"}]);
    }

    #[test]
    fn unknown_stage_is_reported() {
        let (ns, cols) = fixture();
        let err = run_pipeline(&cols, &ns, &[doc! {"$group": {"_id": "$name"}}]).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedStage(s) if s == "$group"));
    }
}
