//! Document-level helpers: projection, update operators, dotted-path writes.

use bson::{Bson, Document};

use super::filter::{get_path, truthy};
use crate::errors::StoreError;
use crate::store::StoreResult;

pub(crate) fn set_path(doc: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => Err(StoreError::Command(format!("cannot create field `{rest}` inside non-document `{head}`"))),
            }
        }
    }
}

pub(crate) fn unset_path(doc: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(child)) => unset_path(child, rest),
            _ => None,
        },
    }
}

/// Applies `$set` / `$unset` to `doc`. Returns whether the document changed.
pub(crate) fn apply_update(doc: &mut Document, update: &Document) -> StoreResult<bool> {
    if update.is_empty() {
        return Err(StoreError::Command("update document is empty".into()));
    }
    let before = doc.clone();
    for (op, spec) in update {
        let Bson::Document(fields) = spec else {
            return Err(StoreError::Command(format!("{op} requires a document")));
        };
        match op.as_str() {
            "$set" => {
                for (path, value) in fields {
                    if path == "_id" && doc.get("_id").is_some_and(|cur| cur != value) {
                        return Err(StoreError::Command("the `_id` field is immutable".into()));
                    }
                    set_path(doc, path, value.clone())?;
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    unset_path(doc, path);
                }
            }
            other if other.starts_with('$') => {
                return Err(StoreError::UnsupportedOperator(other.to_string()));
            }
            _ => {
                return Err(StoreError::Command("update document requires operators".into()));
            }
        }
    }
    Ok(*doc != before)
}

/// Applies an inclusion or exclusion projection. `_id` is kept unless excluded.
pub(crate) fn apply_projection(doc: &Document, projection: &Document) -> StoreResult<Document> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut keep_id = true;
    for (field, flag) in projection {
        if field == "_id" {
            keep_id = truthy(flag);
            continue;
        }
        if truthy(flag) {
            include.push(field.as_str());
        } else {
            exclude.push(field.as_str());
        }
    }
    if !include.is_empty() && !exclude.is_empty() {
        return Err(StoreError::Command("cannot mix inclusion and exclusion in a projection".into()));
    }

    if include.is_empty() {
        let mut out = doc.clone();
        for field in exclude {
            unset_path(&mut out, field);
        }
        if !keep_id {
            out.remove("_id");
        }
        return Ok(out);
    }

    let mut out = Document::new();
    if keep_id && let Some(id) = doc.get("_id") {
        out.insert("_id", id.clone());
    }
    for field in include {
        if let Some(v) = get_path(doc, field) {
            set_path(&mut out, field, v.clone())?;
        }
    }
    Ok(out)
}
