//! Filter documents parsed into an expression tree and evaluated against documents.

use bson::{Bson, Document};
use std::cmp::Ordering;

use crate::errors::StoreError;
use crate::store::{Order, SortSpec, StoreResult};

const MAX_PATH_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

fn and_of(mut parts: Vec<Filter>) -> Filter {
    match parts.len() {
        0 => Filter::True,
        1 => parts.remove(0),
        _ => Filter::And(parts),
    }
}

fn parse_list(key: &str, value: &Bson) -> StoreResult<Vec<Filter>> {
    let Bson::Array(items) = value else {
        return Err(StoreError::Command(format!("{key} requires an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(StoreError::Command(format!("{key} entries must be documents"))),
        })
        .collect()
}

fn array_arg(path: &str, op: &str, value: &Bson) -> StoreResult<Vec<Bson>> {
    match value {
        Bson::Array(vs) => Ok(vs.clone()),
        _ => Err(StoreError::Command(format!("{op} on `{path}` requires an array"))),
    }
}

fn is_operator_document(value: &Bson) -> Option<&Document> {
    match value {
        Bson::Document(d) if !d.is_empty() && d.keys().all(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn parse_field(path: &str, value: &Bson) -> StoreResult<Filter> {
    let Some(ops) = is_operator_document(value) else {
        return Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: value.clone() });
    };
    let mut parts = Vec::with_capacity(ops.len());
    for (op, arg) in ops {
        let p = path.to_string();
        let f = match op.as_str() {
            "$eq" => Filter::Cmp { path: p, op: CmpOp::Eq, value: arg.clone() },
            "$ne" => Filter::Not(Box::new(Filter::Cmp { path: p, op: CmpOp::Eq, value: arg.clone() })),
            "$gt" => Filter::Cmp { path: p, op: CmpOp::Gt, value: arg.clone() },
            "$gte" => Filter::Cmp { path: p, op: CmpOp::Gte, value: arg.clone() },
            "$lt" => Filter::Cmp { path: p, op: CmpOp::Lt, value: arg.clone() },
            "$lte" => Filter::Cmp { path: p, op: CmpOp::Lte, value: arg.clone() },
            "$in" => Filter::In { values: array_arg(path, op, arg)?, path: p },
            "$nin" => Filter::Nin { values: array_arg(path, op, arg)?, path: p },
            "$exists" => Filter::Exists { path: p, exists: truthy(arg) },
            "$not" => Filter::Not(Box::new(parse_field(path, arg)?)),
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        };
        parts.push(f);
    }
    Ok(and_of(parts))
}

/// Parses a store filter document (`{"age": {"$gt": 3}, "$or": [...]}`).
pub(crate) fn parse_filter(doc: &Document) -> StoreResult<Filter> {
    let mut parts = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        match key.as_str() {
            "$and" => parts.push(Filter::And(parse_list(key, value)?)),
            "$or" => parts.push(Filter::Or(parse_list(key, value)?)),
            "$nor" => parts.push(Filter::Not(Box::new(Filter::Or(parse_list(key, value)?)))),
            k if k.starts_with('$') => return Err(StoreError::UnsupportedOperator(k.to_string())),
            field => parts.push(parse_field(field, value)?),
        }
    }
    Ok(and_of(parts))
}

pub(crate) fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => {
            let v = get_path(doc, path).unwrap_or(&Bson::Null);
            values.iter().any(|x| matches_value(v, x))
        }
        Filter::Nin { path, values } => {
            let v = get_path(doc, path).unwrap_or(&Bson::Null);
            !values.iter().any(|x| matches_value(v, x))
        }
        Filter::Cmp { path, op, value } => match (get_path(doc, path), op) {
            (None, CmpOp::Eq) => matches!(value, Bson::Null),
            (None, _) => false,
            (Some(v), CmpOp::Eq) => matches_value(v, value),
            (Some(Bson::Array(items)), op) if !matches!(value, Bson::Array(_)) => {
                items.iter().any(|i| range_matches(i, *op, value))
            }
            (Some(v), op) => range_matches(v, *op, value),
        },
    }
}

/// Range operators only compare values of the same type bracket; `null < 30` is false.
fn range_matches(field: &Bson, op: CmpOp, wanted: &Bson) -> bool {
    if type_rank(field) != type_rank(wanted) {
        return false;
    }
    let c = compare_bson(field, wanted);
    match op {
        CmpOp::Gt => c == Ordering::Greater,
        CmpOp::Gte => c != Ordering::Less,
        CmpOp::Lt => c == Ordering::Less,
        CmpOp::Lte => c != Ordering::Greater,
        CmpOp::Eq => c == Ordering::Equal,
    }
}

/// Equality as queries see it: numbers compare across widths and an array field matches
/// when any element does.
pub(crate) fn matches_value(field: &Bson, wanted: &Bson) -> bool {
    if values_equal(field, wanted) {
        return true;
    }
    match field {
        Bson::Array(items) if !matches!(wanted, Bson::Array(_)) => {
            items.iter().any(|i| values_equal(i, wanted))
        }
        _ => false,
    }
}

pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return as_f64_num(a) == as_f64_num(b);
    }
    a == b
}

pub(crate) fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(d) => *d != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

pub(crate) fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() {
        return None;
    }
    let mut parts = path.split('.');
    let mut cur = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        match cur {
            Bson::Document(d) => cur = d.get(part)?,
            _ => return None,
        }
    }
    Some(cur)
}

pub(crate) fn compare_docs(a: &Document, b: &Document, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

#[allow(clippy::cast_precision_loss)]
fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        _ => f64::NAN,
    }
}

pub(crate) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null | Bson::Undefined => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 1,
        Bson::String(_) | Bson::Symbol(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 6,
        Bson::Boolean(_) => 7,
        Bson::DateTime(_) => 8,
        Bson::Timestamp(_) => 9,
        _ => 10,
    }
}
