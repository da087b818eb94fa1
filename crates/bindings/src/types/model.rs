//! The domain model contract and a generic map-backed model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Identifier;

/// Field data exchanged with a binding.
pub type FieldMap = Map<String, Value>;

/// A value object holding one backend record.
///
/// Bindings never look inside a model beyond these methods. `fields` returns
/// a snapshot used to build write payloads; `populate` merges fields into the
/// model, overwriting existing keys.
pub trait Model: Default + Send + Sync + 'static {
    /// Merges `fields` into the model.
    fn populate(&mut self, fields: FieldMap);

    /// Returns the model's identifier, if it has one.
    fn identifier(&self) -> Option<Identifier>;

    /// Assigns the model's identifier.
    fn set_identifier(&mut self, identifier: Identifier);

    /// Returns a snapshot of the model's fields.
    fn fields(&self) -> FieldMap;
}

/// Field holding a [`Record`]'s identifier.
pub const RECORD_IDENTIFIER_FIELD: &str = "id";

/// A schemaless model backed by a JSON map.
///
/// The identifier lives under the `id` field.
///
/// # Examples
///
/// ```
/// use helios_bindings::types::{Identifier, Model, Record};
/// use serde_json::json;
///
/// let mut record = Record::default();
/// record.populate(json!({"name": "x"}).as_object().unwrap().clone());
/// assert_eq!(record.identifier(), None);
///
/// record.set_identifier(Identifier::from(42));
/// assert_eq!(record.get("id"), Some(&json!(42)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: FieldMap,
}

impl Record {
    /// Creates a record from a field map.
    pub fn new(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// Returns the value of one field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Sets one field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Borrows the underlying map.
    pub fn as_map(&self) -> &FieldMap {
        &self.fields
    }

    /// Consumes the record, returning its map.
    pub fn into_map(self) -> FieldMap {
        self.fields
    }
}

impl Model for Record {
    fn populate(&mut self, fields: FieldMap) {
        self.fields.extend(fields);
    }

    fn identifier(&self) -> Option<Identifier> {
        self.fields
            .get(RECORD_IDENTIFIER_FIELD)
            .and_then(Identifier::from_value)
    }

    fn set_identifier(&mut self, identifier: Identifier) {
        self.fields
            .insert(RECORD_IDENTIFIER_FIELD.to_string(), identifier.to_value());
    }

    fn fields(&self) -> FieldMap {
        self.fields.clone()
    }
}
