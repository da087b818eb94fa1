//! Converting backend payloads into models.

use serde_json::Value;

use crate::types::{FieldMap, Model};

/// The outcome of mapping one JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped<M> {
    /// An object, populated into a new model.
    Model(M),
    /// Anything that is not an object or array, passed through unchanged.
    Scalar(Value),
    /// An array of mapped values.
    List(Vec<Mapped<M>>),
}

/// Creates a model and populates it with `fields`.
pub fn populate_new<M: Model>(fields: FieldMap) -> M {
    let mut model = M::default();
    model.populate(fields);
    model
}

/// Maps a JSON value into models.
///
/// Objects become models, arrays are mapped element by element, and every
/// other value is returned as it came.
///
/// # Examples
///
/// ```
/// use helios_bindings::mapping::{Mapped, map_json};
/// use helios_bindings::types::Record;
/// use serde_json::json;
///
/// assert!(matches!(map_json::<Record>(json!({"id": 1})), Mapped::Model(_)));
/// assert_eq!(map_json::<Record>(json!("ok")), Mapped::Scalar(json!("ok")));
/// ```
pub fn map_json<M: Model>(value: Value) -> Mapped<M> {
    match value {
        Value::Object(fields) => Mapped::Model(populate_new(fields)),
        Value::Array(items) => Mapped::List(items.into_iter().map(map_json).collect()),
        other => Mapped::Scalar(other),
    }
}
