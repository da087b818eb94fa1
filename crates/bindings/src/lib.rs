//! Helios Bindings
//!
//! This crate provides one CRUD contract, [`Binding`], over heterogeneous
//! backends. Application code finds, creates, reads, updates and deletes
//! records the same way whether they live in a relational store behind an
//! ORM session, in a hosted user directory, or behind a REST endpoint.
//!
//! # Features
//!
//! - **One contract**: `find`, `create`, `read`, `refresh`, `update`, `delete`
//! - **One error taxonomy**: every backend failure becomes a [`BindingError`]
//!   with the backend's error attached as its source
//! - **Shared sessions**: the ORM session is opened once per
//!   [`ConnectionRegistry`], however many bindings use it
//! - **Capability discovery**: [`Binding::supports`] tells callers which verbs
//!   a backend implements
//!
//! # Backend Features
//!
//! Enable backends with feature flags in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! helios-bindings = { version = "0.1", default-features = false, features = ["rest"] }
//! ```
//!
//! Available backend features:
//! - `sqlite` (default) - ORM session over SQLite
//! - `directory` (default) - HTTP directory-service client
//! - `rest` (default) - HTTP REST client
//!
//! The binding types and client traits are always available, so a binding
//! can run over a custom client with its feature disabled.
//!
//! # Architecture
//!
//! - [`types`] - identifiers, models, criteria and find results
//! - [`core`] - the [`Binding`] trait and backend kinds
//! - [`error`] - the error taxonomy
//! - [`config`] - settings maps
//! - [`registry`] - shared connection handles
//! - [`mapping`] - converting backend payloads into models
//! - [`orm`], [`directory`], [`rest`] - the binding strategies
//! - [`backends`] - concrete ORM session implementations
//! - [`factory`] - opening a binding from settings
//!
//! # Quick Start
//!
//! ```no_run
//! use helios_bindings::{Binding, ConnectionRegistry, Settings, open_binding};
//! use helios_bindings::types::{Criteria, FindOptions};
//!
//! # async fn example() -> helios_bindings::BindingResult<()> {
//! let settings = Settings::from_json(r#"{
//!     "binding": "orm",
//!     "class": "User",
//!     "path": "app.db"
//! }"#)?;
//!
//! let users = open_binding(ConnectionRegistry::global(), settings).await?;
//! let active = users
//!     .find(&Criteria::new().with("status", "active"), &FindOptions::new().limit(10))
//!     .await?;
//! println!("{} active users", active.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Callers branch on [`BindingError::kind`]:
//!
//! ```
//! use helios_bindings::{BindingError, ErrorKind};
//!
//! fn describe(err: &BindingError) -> &'static str {
//!     match err.kind() {
//!         ErrorKind::NotFound => "gone",
//!         ErrorKind::UnsupportedOperation => "not available on this backend",
//!         _ => "failed",
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod directory;
pub mod error;
pub mod factory;
pub mod mapping;
pub mod orm;
pub mod registry;
pub mod rest;
pub mod types;

// Re-export commonly used types at crate root
pub use config::Settings;
pub use error::{BindingError, BindingResult, ErrorKind};
pub use factory::open_binding;
pub use registry::ConnectionRegistry;
pub use types::{Criteria, FieldMap, FindOptions, Found, Identifier, Model, Record};

// Re-export core traits
pub use core::{BackendKind, Binding, BindingCapability};

// Re-export binding strategies
pub use directory::DirectoryApiBinding;
pub use orm::OrmBinding;
pub use rest::RestBinding;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
