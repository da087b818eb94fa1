//! Backend kinds and binding capabilities.
//!
//! [`BackendKind`] keys the shared-handle registry and labels errors.
//! [`BindingCapability`] lets callers discover which verbs a binding
//! implements before calling them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the kind of backend a binding talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Session-based relational ORM store.
    Orm,
    /// Authenticated directory-service user API.
    DirectoryApi,
    /// Generic REST resource.
    Rest,
}

impl BackendKind {
    /// Parses the value of the `binding` setting.
    pub fn from_setting(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "orm" | "doctrine" | "sqlite" => Some(BackendKind::Orm),
            "directory" | "directory-api" | "gdata" => Some(BackendKind::DirectoryApi),
            "rest" => Some(BackendKind::Rest),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Orm => write!(f, "orm"),
            BackendKind::DirectoryApi => write!(f, "directory-api"),
            BackendKind::Rest => write!(f, "rest"),
        }
    }
}

/// Verbs and options a binding may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingCapability {
    /// List or filter records.
    Find,
    /// Create a record.
    Create,
    /// Read one record by identifier.
    Read,
    /// Re-read backend state into a model in place.
    Refresh,
    /// Persist a model's state.
    Update,
    /// Remove a record.
    Delete,
    /// Backend applies equality criteria on find.
    Criteria,
    /// Backend honours order/limit/offset on find.
    Paging,
    /// Named session/repository operations are reachable.
    Extensions,
}

impl BindingCapability {
    /// Every capability, verbs first.
    pub const ALL: [BindingCapability; 9] = [
        BindingCapability::Find,
        BindingCapability::Create,
        BindingCapability::Read,
        BindingCapability::Refresh,
        BindingCapability::Update,
        BindingCapability::Delete,
        BindingCapability::Criteria,
        BindingCapability::Paging,
        BindingCapability::Extensions,
    ];
}

impl fmt::Display for BindingCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingCapability::Find => "find",
            BindingCapability::Create => "create",
            BindingCapability::Read => "read",
            BindingCapability::Refresh => "refresh",
            BindingCapability::Update => "update",
            BindingCapability::Delete => "delete",
            BindingCapability::Criteria => "criteria",
            BindingCapability::Paging => "paging",
            BindingCapability::Extensions => "extensions",
        };
        write!(f, "{}", name)
    }
}
