//! Backend-native record identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The identifier of one backend record.
///
/// ORM rows are keyed by integers, directory entries by login, REST resources
/// by whatever the endpoint uses. A textual identifier whose content is an
/// integer counts as numeric, so `"42"` reaches an integer primary key.
///
/// # Examples
///
/// ```
/// use helios_bindings::types::Identifier;
///
/// assert_eq!(Identifier::from(42).as_numeric(), Some(42));
/// assert_eq!(Identifier::from("42").as_numeric(), Some(42));
/// assert_eq!(Identifier::from("alice").as_numeric(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    /// Integer key.
    Numeric(i64),
    /// Textual key (login, slug, UUID).
    Text(String),
}

impl Identifier {
    /// Returns the integer form of this identifier, if it has one.
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Identifier::Numeric(n) => Some(*n),
            Identifier::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Returns this identifier as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Identifier::Numeric(n) => Value::from(*n),
            Identifier::Text(s) => Value::from(s.as_str()),
        }
    }

    /// Reads an identifier out of a JSON field value.
    ///
    /// Only integers and non-empty strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Identifier::Numeric),
            Value::String(s) if !s.is_empty() => Some(Identifier::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Numeric(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::Text(value)
    }
}
