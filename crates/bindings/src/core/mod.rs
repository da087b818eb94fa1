//! The binding contract and backend classification.
//!
//! - [`Binding`] - the CRUD contract every strategy implements
//! - [`BackendKind`] - which backend a binding talks to
//! - [`BindingCapability`] - runtime discovery of partially supported verbs
//!
//! # Strategies
//!
//! | Strategy | Kind | Shared handle | Unsupported verbs |
//! |----------|------|---------------|-------------------|
//! | [`OrmBinding`](crate::orm::OrmBinding) | `orm` | one session per registry | `refresh` |
//! | [`DirectoryApiBinding`](crate::directory::DirectoryApiBinding) | `directory-api` | none, per instance | none (`refresh` is a no-op) |
//! | [`RestBinding`](crate::rest::RestBinding) | `rest` | none, per instance | `create`, `refresh`, `update`, `delete` |

pub mod backend;
pub mod binding;

pub use backend::{BackendKind, BindingCapability};
pub use binding::Binding;
