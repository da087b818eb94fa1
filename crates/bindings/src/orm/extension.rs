//! Named session and repository operations reachable through
//! [`OrmBinding::call`](super::OrmBinding::call).
//!
//! Names resolve against the session first, then the repository.
//!
//! | Name | Target | Output |
//! |------|--------|--------|
//! | `clear` | session | [`ExtensionOutput::Unit`] |
//! | `query_log` | session | [`ExtensionOutput::QueryLog`] |
//! | `count` | repository | [`ExtensionOutput::Count`] |
//! | `find_one_by` | repository | [`ExtensionOutput::Model`] |
//! | `find_all` | repository | [`ExtensionOutput::Models`] |

use std::fmt;

use super::session::QueryLogEntry;

/// Operations of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// Discard staged writes.
    Clear,
    /// Read the query log.
    QueryLog,
}

impl SessionOp {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "clear" => Some(SessionOp::Clear),
            "query_log" | "queryLog" => Some(SessionOp::QueryLog),
            _ => None,
        }
    }
}

/// Operations of the entity repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOp {
    /// Count matching records.
    Count,
    /// First matching record.
    FindOneBy,
    /// Every record.
    FindAll,
}

impl RepositoryOp {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "count" => Some(RepositoryOp::Count),
            "find_one_by" | "findOneBy" => Some(RepositoryOp::FindOneBy),
            "find_all" | "findAll" => Some(RepositoryOp::FindAll),
            _ => None,
        }
    }
}

/// A resolved extension operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    /// Handled by the session.
    Session(SessionOp),
    /// Handled by the repository.
    Repository(RepositoryOp),
}

impl Extension {
    /// Resolves `name`, or `None` if neither target offers it.
    pub fn resolve(name: &str) -> Option<Self> {
        SessionOp::parse(name)
            .map(Extension::Session)
            .or_else(|| RepositoryOp::parse(name).map(Extension::Repository))
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extension::Session(SessionOp::Clear) => write!(f, "session::clear"),
            Extension::Session(SessionOp::QueryLog) => write!(f, "session::query_log"),
            Extension::Repository(RepositoryOp::Count) => write!(f, "repository::count"),
            Extension::Repository(RepositoryOp::FindOneBy) => write!(f, "repository::find_one_by"),
            Extension::Repository(RepositoryOp::FindAll) => write!(f, "repository::find_all"),
        }
    }
}

/// What an extension operation returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionOutput<M> {
    /// Nothing.
    Unit,
    /// A row count.
    Count(u64),
    /// At most one record.
    Model(Option<M>),
    /// Records.
    Models(Vec<M>),
    /// Executed statements.
    QueryLog(Vec<QueryLogEntry>),
}
