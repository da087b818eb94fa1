//! Binding over a session-based relational ORM store.
//!
//! [`OrmBinding`] maps the CRUD verbs onto an [`OrmSession`]: reads become
//! primary-key lookups or translated equality queries, writes are staged and
//! flushed as one unit of work. The session is shared by every ORM binding of
//! a [`ConnectionRegistry`](crate::registry::ConnectionRegistry).
//!
//! # Settings
//!
//! | Key | Required | Description |
//! |-----|----------|-------------|
//! | `class` | yes | Entity name |
//! | `path` | yes | SQLite database file, or `:memory:` |
//! | `metadata_dir` | no | Directory of `<Entity>.json` metadata files |
//! | `dev_mode` | no | Defaults to `true` unless `HELIOS_BINDINGS_ENV=production` |
//! | `meta_cache` | no | `memory` or `none` |
//! | `query_cache` | no | `memory` or `none` |
//! | `proxy_dir`, `proxy_namespace` | no | Accepted and ignored |
//! | `max_connections` | no | Connection pool size |
//! | `busy_timeout_ms` | no | SQLite busy timeout |

mod binding;
pub mod extension;
pub mod metadata;
pub mod query;
mod repository;
pub mod session;
pub mod settings;

pub use binding::{OrmBinding, SharedSession};
pub use extension::{Extension, ExtensionOutput};
pub use metadata::{ColumnType, EntityMetadata, MetadataLoader};
pub use query::{CriteriaTranslator, EntityQuery};
pub use repository::Repository;
pub use session::{
    FlushReport, OrmSession, QueryLogEntry, SessionError, SessionFactory, StageTicket,
};
pub use settings::{CacheKind, OrmSettings, SessionConfig};
