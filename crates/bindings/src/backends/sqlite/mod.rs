//! SQLite ORM session.
//!
//! Entities map onto tables. Without a metadata directory the entity `User`
//! lives in the table `User` keyed by an `id` column:
//!
//! ```sql
//! CREATE TABLE User (
//!     id INTEGER PRIMARY KEY,
//!     name TEXT,
//!     active INTEGER
//! );
//! ```
//!
//! Reads run directly on a pooled connection. Staged writes run in one
//! transaction per flush. In-memory databases use a single connection for the
//! life of the session.

pub mod query_builder;
mod session;
mod values;

pub use session::{SqliteSession, SqliteSessionFactory};
