//! Concrete session backends for the ORM binding.
//!
//! Each backend is gated behind a feature flag.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | SQLite | `sqlite` | Pooled SQLite database, file-based or in-memory |
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! use helios_bindings::backends::sqlite::SqliteSession;
//! use helios_bindings::orm::SessionConfig;
//!
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SqliteSession::open(&SessionConfig::new("./data/app.db"))?;
//! session.execute_batch("CREATE TABLE IF NOT EXISTS User (id INTEGER PRIMARY KEY, name TEXT)")?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "sqlite")]
pub mod sqlite;
