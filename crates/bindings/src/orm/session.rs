//! The ORM session contract.
//!
//! A session maps entities onto tables, answers queries, and stages writes
//! into a unit of work that [`OrmSession::flush`] commits atomically. The
//! binding layer only talks to this trait; the SQLite implementation lives in
//! [`crate::backends::sqlite`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BoxedCause;
use crate::types::FieldMap;

use super::query::EntityQuery;
use super::settings::SessionConfig;

/// Errors raised by an ORM session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No metadata exists for the entity.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// The entity's metadata file is unreadable or malformed.
    #[error("invalid metadata for entity '{entity}': {message}")]
    Metadata {
        /// Entity name.
        entity: String,
        /// What went wrong.
        message: String,
    },

    /// A staged update or removal targeted a row that does not exist.
    #[error("{entity} {identifier} does not exist")]
    RowNotFound {
        /// Entity name.
        entity: String,
        /// Primary key.
        identifier: i64,
    },

    /// A field or table name is not a plain identifier.
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// A staged write is missing something it needs.
    #[error("invalid write to '{entity}': {message}")]
    InvalidWrite {
        /// Entity name.
        entity: String,
        /// What is missing.
        message: String,
    },

    /// The session could not be opened or a connection could not be acquired.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The database rejected a statement.
    #[error("statement failed: {message}")]
    Statement {
        /// Database error text.
        message: String,
        /// Underlying database error.
        #[source]
        source: Option<BoxedCause>,
    },
}

/// Handle to one staged write, valid until the session is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageTicket(pub(crate) u64);

impl fmt::Display for StageTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Row counts of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Rows inserted.
    pub inserted: usize,
    /// Rows updated.
    pub updated: usize,
    /// Rows deleted.
    pub deleted: usize,
}

impl FlushReport {
    /// Total rows written.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    /// SQL text with placeholders.
    pub sql: String,
    /// Number of bound parameters.
    pub params: usize,
    /// When the statement was executed.
    pub executed_at: DateTime<Utc>,
}

/// A session over a relational store.
///
/// Reads go straight to the store. Writes are staged with
/// [`persist`](OrmSession::persist), [`merge`](OrmSession::merge) and
/// [`remove`](OrmSession::remove) and reach the store on the next
/// [`flush`](OrmSession::flush), all or nothing.
#[async_trait]
pub trait OrmSession: Send + Sync + fmt::Debug {
    /// Looks up one row by primary key.
    async fn find(&self, entity: &str, identifier: i64) -> Result<Option<FieldMap>, SessionError>;

    /// Returns every row of the entity.
    async fn find_all(&self, entity: &str) -> Result<Vec<FieldMap>, SessionError>;

    /// Returns the rows matching `query`.
    async fn find_by(&self, query: &EntityQuery) -> Result<Vec<FieldMap>, SessionError>;

    /// Counts the rows matching `query`, ignoring its order and paging.
    async fn count(&self, query: &EntityQuery) -> Result<u64, SessionError>;

    /// Stages a new row. Without an identifier field one is generated.
    fn persist(&self, entity: &str, fields: FieldMap) -> StageTicket;

    /// Stages an update of an existing row.
    ///
    /// An identifier field in `fields` is ignored; `identifier` selects the row.
    fn merge(&self, entity: &str, identifier: i64, fields: FieldMap) -> StageTicket;

    /// Stages removal of a row.
    fn remove(&self, entity: &str, identifier: i64) -> StageTicket;

    /// Commits every staged write in one transaction.
    ///
    /// On failure nothing is written and the staged writes are discarded.
    async fn flush(&self) -> Result<FlushReport, SessionError>;

    /// Takes the identifier a committed write targeted or generated.
    ///
    /// Each ticket yields its identifier once. `None` means the write has not
    /// been flushed, or was discarded by a flush that failed or by [`clear`].
    ///
    /// [`clear`]: OrmSession::clear
    fn take_assigned(&self, ticket: StageTicket) -> Option<i64>;

    /// Discards staged writes and assigned identifiers.
    fn clear(&self);

    /// Returns the most recent executed statements, oldest first.
    fn query_log(&self) -> Vec<QueryLogEntry>;
}

/// Opens ORM sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Opens a session for `config`.
    async fn open(&self, config: &SessionConfig) -> Result<Arc<dyn OrmSession>, SessionError>;
}
