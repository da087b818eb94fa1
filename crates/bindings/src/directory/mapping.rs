//! Flattening directory entries into model fields and back.
//!
//! | Field | Entry |
//! |-------|-------|
//! | `username` | `login.userName` |
//! | `password` | `login.password` |
//! | `admin` | `login.admin` |
//! | `active` | not `login.suspended` |
//! | `given_name` | `name.givenName` |
//! | `family_name` | `name.familyName` |

use serde_json::Value;

use crate::mapping::populate_new;
use crate::types::{FieldMap, Identifier, Model};

use super::client::UserEntry;

/// Flattens an entry into model fields.
pub fn entry_to_fields(entry: &UserEntry) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("given_name".into(), Value::from(entry.name.given_name.as_str()));
    fields.insert("family_name".into(), Value::from(entry.name.family_name.as_str()));
    fields.insert("username".into(), Value::from(entry.login.username.as_str()));
    fields.insert(
        "password".into(),
        entry
            .login
            .password
            .as_deref()
            .map_or(Value::Null, Value::from),
    );
    fields.insert("admin".into(), Value::Bool(entry.login.admin));
    fields.insert("active".into(), Value::Bool(!entry.login.suspended));
    fields
}

/// Maps an entry into a new model identified by its login.
pub fn map_entry<M: Model>(entry: &UserEntry) -> M {
    let mut model: M = populate_new(entry_to_fields(entry));
    if model.identifier().is_none() && !entry.login.username.is_empty() {
        model.set_identifier(Identifier::from(entry.login.username.as_str()));
    }
    model
}

/// Copies the writable fields of a model onto an entry.
///
/// Only `username`, `password`, `given_name` and `family_name` are copied,
/// and only when the model holds a string for them. Admin and suspension
/// flags are left as the directory reported them.
pub fn apply_model(fields: &FieldMap, entry: &mut UserEntry) {
    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

    if let Some(username) = text("username") {
        entry.login.username = username;
    }
    if let Some(password) = text("password") {
        entry.login.password = Some(password);
    }
    if let Some(given_name) = text("given_name") {
        entry.name.given_name = given_name;
    }
    if let Some(family_name) = text("family_name") {
        entry.name.family_name = family_name;
    }
}

/// The login a model refers to: its identifier, else its `username` field.
pub fn model_login<M: Model>(model: &M) -> Option<String> {
    model
        .identifier()
        .map(|id| id.to_string())
        .or_else(|| {
            model
                .fields()
                .get("username")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|login| !login.is_empty())
}
