//! `_id` resolution and parsing for identifier equality filters.

use bson::Bson;
use bson::oid::ObjectId;

use crate::errors::{OdmError, Result};
use crate::model::{FieldKind, Model};

/// Canonical identifier field name.
pub const ID_FIELD: &str = "_id";

/// Accepted shapes for an identifier argument.
#[derive(Debug, Clone, PartialEq)]
pub enum IdInput {
    Text(String),
    Native(ObjectId),
    Other(Bson),
}

impl From<&str> for IdInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for IdInput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<ObjectId> for IdInput {
    fn from(id: ObjectId) -> Self {
        Self::Native(id)
    }
}

impl From<&ObjectId> for IdInput {
    fn from(id: &ObjectId) -> Self {
        Self::Native(*id)
    }
}

impl From<Bson> for IdInput {
    fn from(v: Bson) -> Self {
        match v {
            Bson::String(s) => Self::Text(s),
            Bson::ObjectId(id) => Self::Native(id),
            other => Self::Other(other),
        }
    }
}

/// Whether `M` declares an `_id` field stored as an `ObjectId`.
#[must_use]
pub fn resolve_identifier_field<M: Model>() -> bool {
    M::fields().iter().any(|f| f.name == ID_FIELD && f.kind == FieldKind::ObjectId)
}

/// Converts `input` into the store's native identifier.
///
/// # Errors
/// `InvalidIdentifier` for text that is not a 24-digit hex id,
/// `UnsupportedIdentifierType` for any other input shape.
pub fn parse_identifier(input: impl Into<IdInput>) -> Result<ObjectId> {
    match input.into() {
        IdInput::Native(id) => Ok(id),
        IdInput::Text(s) => {
            ObjectId::parse_str(&s).map_err(|e| OdmError::InvalidIdentifier(format!("{s:?}: {e}")))
        }
        IdInput::Other(v) => Err(OdmError::UnsupportedIdentifierType(format!("{:?}", v.element_type()))),
    }
}

/// Resolves and parses in one step, the typed counterpart of `Query::where_id`.
///
/// # Errors
/// `MissingIdentifierField` when `M` has no `ObjectId` `_id`, or any error of
/// [`parse_identifier`].
pub fn identifier_for<M: Model>(input: impl Into<IdInput>) -> Result<ObjectId> {
    if !resolve_identifier_field::<M>() {
        return Err(OdmError::MissingIdentifierField(std::any::type_name::<M>().to_string()));
    }
    parse_identifier(input)
}
