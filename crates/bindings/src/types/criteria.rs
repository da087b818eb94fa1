//! Find criteria and options.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BindingError, BindingResult};

use super::FieldMap;

/// Equality criteria for `find`.
///
/// Every entry must match (AND semantics). Empty criteria select the whole
/// collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(FieldMap);

impl Criteria {
    /// Creates empty criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Returns `true` if no condition is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the conditions in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns `true` if every condition equals the matching field of `fields`.
    pub fn matches(&self, fields: &FieldMap) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| fields.get(field) == Some(expected))
    }
}

impl From<FieldMap> for Criteria {
    fn from(map: FieldMap) -> Self {
        Self(map)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(SortDirection::Asc),
            "DESC" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field to sort on.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

/// Options for `find`.
///
/// Bindings whose backend cannot page ignore these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Sort keys, most significant first.
    pub order: Vec<OrderBy>,
    /// Maximum number of records.
    pub limit: Option<u64>,
    /// Number of records to skip.
    pub offset: Option<u64>,
}

impl FindOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sort key.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Sets the limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns `true` if no option is set.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.limit.is_none() && self.offset.is_none()
    }

    /// Parses options from a map with the keys `order`, `limit` and `offset`.
    ///
    /// `order` is either an object (`{"name": "ASC"}`, in key order) or an
    /// array of `[field, direction]` pairs. Unknown keys are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_bindings::types::{FindOptions, SortDirection};
    /// use serde_json::json;
    ///
    /// let options = FindOptions::from_map(
    ///     json!({"order": [["name", "desc"]], "limit": 10}).as_object().unwrap(),
    /// ).unwrap();
    /// assert_eq!(options.order[0].direction, SortDirection::Desc);
    /// assert_eq!(options.limit, Some(10));
    /// ```
    pub fn from_map(map: &FieldMap) -> BindingResult<Self> {
        let mut options = FindOptions::new();

        match map.get("order") {
            None | Some(Value::Null) => {}
            Some(Value::Object(keys)) => {
                for (field, direction) in keys {
                    options.order.push(OrderBy {
                        field: field.clone(),
                        direction: parse_direction(direction)?,
                    });
                }
            }
            Some(Value::Array(pairs)) => {
                for pair in pairs {
                    let (field, direction) = match pair.as_array().map(Vec::as_slice) {
                        Some([Value::String(field)]) => (field.clone(), SortDirection::Asc),
                        Some([Value::String(field), direction]) => {
                            (field.clone(), parse_direction(direction)?)
                        }
                        _ => return Err(invalid_option("order", pair)),
                    };
                    options.order.push(OrderBy { field, direction });
                }
            }
            Some(other) => return Err(invalid_option("order", other)),
        }

        options.limit = parse_count(map, "limit")?;
        options.offset = parse_count(map, "offset")?;

        Ok(options)
    }
}

fn parse_direction(value: &Value) -> BindingResult<SortDirection> {
    value
        .as_str()
        .and_then(SortDirection::parse)
        .ok_or_else(|| invalid_option("order", value))
}

fn parse_count(map: &FieldMap, key: &str) -> BindingResult<Option<u64>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid_option(key, value)),
    }
}

fn invalid_option(key: &str, value: &Value) -> BindingError {
    BindingError::QueryFailure {
        target: "find options".to_string(),
        message: format!("invalid value for '{}': {}", key, value),
        source: None,
    }
}
