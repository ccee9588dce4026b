use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt::Debug;

use crate::observer::ObserverRecord;

/// Storage kind of a declared field, as far as identifier resolution cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    ObjectId,
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Document,
    Array,
}

/// Declared metadata of one model field; `name` is the stored (BSON) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldMeta {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A type that maps to documents of one collection.
///
/// ```ignore
/// #[derive(Debug, Serialize, Deserialize)]
/// struct User {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     id: Option<ObjectId>,
///     name: String,
/// }
///
/// impl Model for User {
///     fn fields() -> &'static [FieldMeta] {
///         const FIELDS: &[FieldMeta] =
///             &[FieldMeta::new("_id", FieldKind::ObjectId), FieldMeta::new("name", FieldKind::String)];
///         FIELDS
///     }
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// Declared fields; used to check for an `ObjectId` primary key.
    fn fields() -> &'static [FieldMeta] {
        &[]
    }

    /// Observers this instance brings to every mutation it takes part in.
    fn observers(&self) -> Vec<ObserverRecord> {
        Vec::new()
    }
}

/// Object-safe view of a model handed to observers.
pub trait Entity: Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Debug + Send + Sync> Entity for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Entity + '_ {
    /// Downcasts to a concrete model type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}
