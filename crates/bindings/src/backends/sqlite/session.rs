//! SQLite implementation of the ORM session.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use tracing::{debug, info};

use crate::orm::{
    CacheKind, CriteriaTranslator, EntityMetadata, EntityQuery, FlushReport, MetadataLoader,
    OrmSession, QueryLogEntry, SessionConfig, SessionError, SessionFactory, StageTicket,
};
use crate::types::FieldMap;

use super::query_builder::{self, SqlFragment};
use super::values::from_sql;

/// Prepared statements kept per connection when the query cache is on.
const STATEMENT_CACHE_CAPACITY: usize = 64;

fn statement_error(e: rusqlite::Error) -> SessionError {
    SessionError::Statement {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
}

enum StagedWrite {
    Insert { entity: String, fields: FieldMap },
    Update { entity: String, identifier: i64, fields: FieldMap },
    Delete { entity: String, identifier: i64 },
}

#[derive(Default)]
struct UnitOfWork {
    next_ticket: u64,
    staged: Vec<(StageTicket, StagedWrite)>,
    assigned: HashMap<StageTicket, i64>,
}

impl UnitOfWork {
    fn stage(&mut self, write: StagedWrite) -> StageTicket {
        self.next_ticket += 1;
        let ticket = StageTicket(self.next_ticket);
        self.staged.push((ticket, write));
        ticket
    }
}

/// An ORM session over a pooled SQLite database.
///
/// Entities map onto tables through [`EntityMetadata`]; the identifier column
/// must be an `INTEGER PRIMARY KEY` so SQLite assigns it on insert.
pub struct SqliteSession {
    pool: Pool<SqliteConnectionManager>,
    config: SessionConfig,
    metadata: MetadataLoader,
    translator: CriteriaTranslator,
    unit_of_work: Mutex<UnitOfWork>,
    query_log: Mutex<VecDeque<QueryLogEntry>>,
}

impl Debug for SqliteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSession")
            .field("path", &self.config.path)
            .field("dev_mode", &self.config.dev_mode)
            .field("staged", &self.unit_of_work.lock().staged.len())
            .finish_non_exhaustive()
    }
}

impl SqliteSession {
    /// Opens the database described by `config`.
    pub fn open(config: &SessionConfig) -> Result<Self, SessionError> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let statement_cache = match config.query_cache {
            CacheKind::Memory => STATEMENT_CACHE_CAPACITY,
            CacheKind::None => 0,
        };

        let manager = if config.is_memory() {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(&config.path)
        };
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.set_prepared_statement_cache_capacity(statement_cache);
            conn.execute_batch("PRAGMA foreign_keys = ON")
        });

        // Each in-memory connection is its own database, so the pool holds
        // exactly one and never recycles it.
        let builder: r2d2::Builder<SqliteConnectionManager> = if config.is_memory() {
            Pool::builder()
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            Pool::builder().max_size(config.max_connections.max(1))
        };
        let pool = builder
            .build(manager)
            .map_err(|e| SessionError::Connection(e.to_string()))?;

        let translator =
            CriteriaTranslator::new().map_err(|e| SessionError::Connection(e.to_string()))?;

        info!(
            path = %config.path,
            max_connections = pool.max_size(),
            query_cache = ?config.query_cache,
            "Opened SQLite session"
        );

        Ok(Self {
            pool,
            config: config.clone(),
            metadata: MetadataLoader::new(config),
            translator,
            unit_of_work: Mutex::new(UnitOfWork::default()),
            query_log: Mutex::new(VecDeque::new()),
        })
    }

    /// Runs a batch of SQL outside the unit of work.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SessionError> {
        let conn = self.connection()?;
        self.log(sql, 0);
        conn.execute_batch(sql).map_err(statement_error)
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of writes waiting for the next flush.
    pub fn staged(&self) -> usize {
        self.unit_of_work.lock().staged.len()
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, SessionError> {
        self.pool
            .get()
            .map_err(|e| SessionError::Connection(e.to_string()))
    }

    fn entity_metadata(&self, entity: &str) -> Result<Arc<EntityMetadata>, SessionError> {
        let metadata = self.metadata.load(entity)?;
        for name in [&metadata.table, &metadata.identifier] {
            self.check_name(name)?;
        }
        for column in metadata.columns.keys() {
            self.check_name(column)?;
        }
        Ok(metadata)
    }

    fn check_name(&self, name: &str) -> Result<(), SessionError> {
        if self.translator.is_identifier(name) {
            Ok(())
        } else {
            Err(SessionError::InvalidName(name.to_string()))
        }
    }

    fn check_fields(&self, fields: &FieldMap) -> Result<(), SessionError> {
        fields.keys().try_for_each(|column| self.check_name(column))
    }

    fn log(&self, sql: &str, params: usize) {
        debug!(sql, params, "Executing statement");
        if self.config.query_log_capacity == 0 {
            return;
        }
        let mut log = self.query_log.lock();
        while log.len() >= self.config.query_log_capacity {
            log.pop_front();
        }
        log.push_back(QueryLogEntry {
            sql: sql.to_string(),
            params,
            executed_at: Utc::now(),
        });
    }

    fn query_rows(
        &self,
        conn: &Connection,
        metadata: &EntityMetadata,
        fragment: &SqlFragment,
    ) -> Result<Vec<FieldMap>, SessionError> {
        self.log(&fragment.sql, fragment.params.len());

        let mut cached;
        let mut plain;
        let statement = if self.config.query_cache == CacheKind::Memory {
            cached = conn.prepare_cached(&fragment.sql).map_err(statement_error)?;
            &mut *cached
        } else {
            plain = conn.prepare(&fragment.sql).map_err(statement_error)?;
            &mut plain
        };

        let columns: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = statement
            .query(params_from_iter(fragment.params.iter()))
            .map_err(statement_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(statement_error)? {
            let mut fields = FieldMap::new();
            for (index, column) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(statement_error)?;
                fields.insert(column.clone(), from_sql(value, metadata.column_type(column)));
            }
            out.push(fields);
        }
        Ok(out)
    }

    fn execute(&self, conn: &Connection, fragment: &SqlFragment) -> Result<usize, SessionError> {
        self.log(&fragment.sql, fragment.params.len());
        let params = params_from_iter(fragment.params.iter());
        if self.config.query_cache == CacheKind::Memory {
            conn.prepare_cached(&fragment.sql)
                .and_then(|mut statement| statement.execute(params))
                .map_err(statement_error)
        } else {
            conn.execute(&fragment.sql, params).map_err(statement_error)
        }
    }

    fn apply(
        &self,
        conn: &Connection,
        write: &StagedWrite,
        report: &mut FlushReport,
    ) -> Result<i64, SessionError> {
        match write {
            StagedWrite::Insert { entity, fields } => {
                let metadata = self.entity_metadata(entity)?;
                self.check_fields(fields)?;
                self.execute(conn, &query_builder::insert(&metadata, fields))?;
                report.inserted += 1;
                Ok(fields
                    .get(&metadata.identifier)
                    .and_then(Value::as_i64)
                    .unwrap_or_else(|| conn.last_insert_rowid()))
            }
            StagedWrite::Update {
                entity,
                identifier,
                fields,
            } => {
                let metadata = self.entity_metadata(entity)?;
                self.check_fields(fields)?;
                let changed =
                    self.execute(conn, &query_builder::update(&metadata, *identifier, fields))?;
                if changed == 0 {
                    return Err(SessionError::RowNotFound {
                        entity: entity.clone(),
                        identifier: *identifier,
                    });
                }
                report.updated += changed;
                Ok(*identifier)
            }
            StagedWrite::Delete { entity, identifier } => {
                let metadata = self.entity_metadata(entity)?;
                let changed = self.execute(conn, &query_builder::delete(&metadata, *identifier))?;
                if changed == 0 {
                    return Err(SessionError::RowNotFound {
                        entity: entity.clone(),
                        identifier: *identifier,
                    });
                }
                report.deleted += changed;
                Ok(*identifier)
            }
        }
    }
}

#[async_trait]
impl OrmSession for SqliteSession {
    async fn find(&self, entity: &str, identifier: i64) -> Result<Option<FieldMap>, SessionError> {
        let metadata = self.entity_metadata(entity)?;
        let conn = self.connection()?;
        let rows = self.query_rows(
            &conn,
            &metadata,
            &query_builder::select_by_id(&metadata, identifier),
        )?;
        Ok(rows.into_iter().next())
    }

    async fn find_all(&self, entity: &str) -> Result<Vec<FieldMap>, SessionError> {
        let metadata = self.entity_metadata(entity)?;
        let conn = self.connection()?;
        self.query_rows(&conn, &metadata, &query_builder::select_all(&metadata))
    }

    async fn find_by(&self, query: &EntityQuery) -> Result<Vec<FieldMap>, SessionError> {
        let metadata = self.entity_metadata(&query.entity)?;
        let conn = self.connection()?;
        self.query_rows(&conn, &metadata, &query_builder::select_query(&metadata, query))
    }

    async fn count(&self, query: &EntityQuery) -> Result<u64, SessionError> {
        let metadata = self.entity_metadata(&query.entity)?;
        let fragment = query_builder::count_query(&metadata, query);
        let conn = self.connection()?;
        self.log(&fragment.sql, fragment.params.len());
        let count: i64 = conn
            .query_row(&fragment.sql, params_from_iter(fragment.params.iter()), |row| {
                row.get(0)
            })
            .map_err(statement_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn persist(&self, entity: &str, fields: FieldMap) -> StageTicket {
        self.unit_of_work.lock().stage(StagedWrite::Insert {
            entity: entity.to_string(),
            fields,
        })
    }

    fn merge(&self, entity: &str, identifier: i64, fields: FieldMap) -> StageTicket {
        self.unit_of_work.lock().stage(StagedWrite::Update {
            entity: entity.to_string(),
            identifier,
            fields,
        })
    }

    fn remove(&self, entity: &str, identifier: i64) -> StageTicket {
        self.unit_of_work.lock().stage(StagedWrite::Delete {
            entity: entity.to_string(),
            identifier,
        })
    }

    async fn flush(&self) -> Result<FlushReport, SessionError> {
        let staged = std::mem::take(&mut self.unit_of_work.lock().staged);
        if staged.is_empty() {
            return Ok(FlushReport::default());
        }

        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(statement_error)?;

        let mut report = FlushReport::default();
        let mut assigned = Vec::with_capacity(staged.len());
        for (ticket, write) in &staged {
            // Dropping `tx` on error rolls the whole flush back.
            let identifier = self.apply(&tx, write, &mut report)?;
            assigned.push((*ticket, identifier));
        }
        tx.commit().map_err(statement_error)?;

        self.unit_of_work.lock().assigned.extend(assigned);
        debug!(
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "Flushed unit of work"
        );
        Ok(report)
    }

    fn take_assigned(&self, ticket: StageTicket) -> Option<i64> {
        self.unit_of_work.lock().assigned.remove(&ticket)
    }

    fn clear(&self) {
        let mut unit_of_work = self.unit_of_work.lock();
        unit_of_work.staged.clear();
        unit_of_work.assigned.clear();
    }

    fn query_log(&self) -> Vec<QueryLogEntry> {
        self.query_log.lock().iter().cloned().collect()
    }
}

/// Opens [`SqliteSession`]s, optionally running setup SQL on the new database.
#[derive(Debug, Clone, Default)]
pub struct SqliteSessionFactory {
    init_sql: Option<String>,
}

impl SqliteSessionFactory {
    /// Creates a factory with no setup SQL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `sql` once after opening each session.
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }
}

#[async_trait]
impl SessionFactory for SqliteSessionFactory {
    async fn open(&self, config: &SessionConfig) -> Result<Arc<dyn OrmSession>, SessionError> {
        let session = SqliteSession::open(config)?;
        if let Some(sql) = &self.init_sql {
            session.execute_batch(sql)?;
        }
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SCHEMA: &str = "CREATE TABLE User (id INTEGER PRIMARY KEY, name TEXT, age INTEGER);";

    fn session() -> SqliteSession {
        let session = SqliteSession::open(&SessionConfig::new(":memory:")).unwrap();
        session.execute_batch(SCHEMA).unwrap();
        session
    }

    fn fields(value: Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_persist_flush_find() {
        let session = session();
        let first = session.persist("User", fields(json!({"name": "Ann", "age": 30})));
        let second = session.persist("User", fields(json!({"name": "Bo", "age": 41})));
        assert_eq!(session.staged(), 2);

        let report = session.flush().await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(session.staged(), 0);

        let id = session.take_assigned(first).unwrap();
        let row = session.find("User", id).await.unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&json!("Ann")));
        assert!(session.take_assigned(second).is_some());
        assert!(session.take_assigned(first).is_none());

        assert_eq!(session.find_all("User").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_flush_rolls_back() {
        let session = session();
        session.persist("User", fields(json!({"name": "Ann"})));
        session.merge("User", 999, fields(json!({"name": "Ghost"})));

        let err = session.flush().await.unwrap_err();
        assert!(matches!(err, SessionError::RowNotFound { identifier: 999, .. }));
        assert!(session.find_all("User").await.unwrap().is_empty());
        assert_eq!(session.staged(), 0);
    }

    #[tokio::test]
    async fn test_rejects_invalid_column_names() {
        let session = session();
        session.persist("User", fields(json!({"name\" TEXT); --": "x"})));

        let err = session.flush().await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_count_and_find_by() {
        let session = session();
        for (name, age) in [("Ann", 30), ("Bo", 30), ("Cy", 50)] {
            session.persist("User", fields(json!({"name": name, "age": age})));
        }
        session.flush().await.unwrap();

        let mut query = EntityQuery::all("User");
        query.filters = vec![("age".to_string(), json!(30))];
        assert_eq!(session.count(&query).await.unwrap(), 2);

        query.limit = Some(1);
        let rows = session.find_by(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&json!("Ann")));
    }

    #[tokio::test]
    async fn test_query_log_is_bounded() {
        let mut config = SessionConfig::new(":memory:");
        config.query_log_capacity = 2;
        let session = SqliteSession::open(&config).unwrap();
        session.execute_batch(SCHEMA).unwrap();

        session.find_all("User").await.unwrap();
        session.find("User", 1).await.unwrap();

        let log = session.query_log();
        assert_eq!(log.len(), 2);
        assert!(log[0].sql.starts_with("SELECT * FROM \"User\" ORDER BY"));
        assert_eq!(log[1].params, 1);
    }

    #[tokio::test]
    async fn test_clear_discards_staged_writes() {
        let session = session();
        let ticket = session.persist("User", fields(json!({"name": "Ann"})));
        session.clear();

        assert_eq!(session.flush().await.unwrap(), FlushReport::default());
        assert!(session.take_assigned(ticket).is_none());
    }

    #[tokio::test]
    async fn test_taken_identifiers_are_released() {
        let session = session();
        for round in 0..100 {
            let insert = session.persist("User", fields(json!({"name": format!("u{}", round)})));
            session.flush().await.unwrap();
            let id = session.take_assigned(insert).unwrap();

            let update = session.merge("User", id, fields(json!({"age": round})));
            session.flush().await.unwrap();
            assert_eq!(session.take_assigned(update), Some(id));

            let delete = session.remove("User", id);
            session.flush().await.unwrap();
            assert_eq!(session.take_assigned(delete), Some(id));
        }

        assert!(session.unit_of_work.lock().assigned.is_empty());
        assert!(session.find_all("User").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_discarded_by_failed_flush_has_no_identifier() {
        let session = session();
        session.persist("User", fields(json!({"name": "Ann"})));
        session.flush().await.unwrap();

        // One caller stages a delete; another caller's broken insert fails
        // the flush that carries both.
        let delete = session.remove("User", 1);
        session.persist("User", fields(json!({"missing_column": 1})));
        assert!(session.flush().await.is_err());

        assert!(session.take_assigned(delete).is_none());
        assert_eq!(session.find_all("User").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_statement_cache() {
        let mut config = SessionConfig::new(":memory:");
        config.query_cache = CacheKind::Memory;
        let session = SqliteSession::open(&config).unwrap();
        session.execute_batch(SCHEMA).unwrap();

        session.persist("User", fields(json!({"name": "Ann"})));
        session.flush().await.unwrap();
        assert_eq!(session.find_all("User").await.unwrap().len(), 1);
        assert_eq!(session.find_all("User").await.unwrap().len(), 1);
    }
}
