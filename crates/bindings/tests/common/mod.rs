//! Test infrastructure for the binding integration tests.
//!
//! Mock directory and REST clients keep their state behind an
//! `Arc<Mutex<_>>` so a test can inspect what a binding sent. The counting
//! session factory wraps the real SQLite factory.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
#[cfg(feature = "sqlite")]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use helios_bindings::Settings;
#[cfg(feature = "sqlite")]
use helios_bindings::backends::sqlite::SqliteSessionFactory;
use helios_bindings::directory::{DirectoryClient, DirectoryError, Login, Name, NewUser, UserEntry};
#[cfg(feature = "sqlite")]
use helios_bindings::orm::{
    EntityQuery, FlushReport, OrmSession, QueryLogEntry, SessionConfig, SessionError,
    SessionFactory, StageTicket,
};
#[cfg(feature = "sqlite")]
use helios_bindings::types::FieldMap;
use helios_bindings::rest::{RestClient, RestError, RestRequest};

pub const USER_SCHEMA: &str = "
    CREATE TABLE User (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        status TEXT,
        age INTEGER
    );
";

/// ORM settings for an in-memory database.
pub fn orm_settings(entity: &str) -> Settings {
    Settings::new().with("class", entity).with("path", ":memory:")
}

// ============================================================================
// Session factory
// ============================================================================

/// Opens real SQLite sessions and counts how often it was asked to.
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone)]
pub struct CountingFactory {
    inner: SqliteSessionFactory,
    opened: Arc<AtomicUsize>,
    fail: bool,
}

#[cfg(feature = "sqlite")]
impl CountingFactory {
    pub fn new(init_sql: &str) -> Self {
        Self {
            inner: SqliteSessionFactory::new().with_init_sql(init_sql),
            opened: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl SessionFactory for CountingFactory {
    async fn open(&self, config: &SessionConfig) -> Result<Arc<dyn OrmSession>, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        // Widen the race window for concurrent first constructions.
        tokio::task::yield_now().await;
        if self.fail {
            return Err(SessionError::Connection("database is on fire".to_string()));
        }
        self.inner.open(config).await
    }
}

/// Opens sessions on which another caller's broken insert is flushed just
/// before every flush, while contended.
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone)]
pub struct ContendedFactory {
    inner: SqliteSessionFactory,
    contended: Arc<AtomicBool>,
}

#[cfg(feature = "sqlite")]
impl ContendedFactory {
    pub fn new(init_sql: &str) -> Self {
        Self {
            inner: SqliteSessionFactory::new().with_init_sql(init_sql),
            contended: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_contended(&self, contended: bool) {
        self.contended.store(contended, Ordering::SeqCst);
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl SessionFactory for ContendedFactory {
    async fn open(&self, config: &SessionConfig) -> Result<Arc<dyn OrmSession>, SessionError> {
        let inner = self.inner.open(config).await?;
        Ok(Arc::new(ContendedSession {
            inner,
            contended: Arc::clone(&self.contended),
        }))
    }
}

#[cfg(feature = "sqlite")]
#[derive(Debug)]
struct ContendedSession {
    inner: Arc<dyn OrmSession>,
    contended: Arc<AtomicBool>,
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl OrmSession for ContendedSession {
    async fn find(&self, entity: &str, identifier: i64) -> Result<Option<FieldMap>, SessionError> {
        self.inner.find(entity, identifier).await
    }

    async fn find_all(&self, entity: &str) -> Result<Vec<FieldMap>, SessionError> {
        self.inner.find_all(entity).await
    }

    async fn find_by(&self, query: &EntityQuery) -> Result<Vec<FieldMap>, SessionError> {
        self.inner.find_by(query).await
    }

    async fn count(&self, query: &EntityQuery) -> Result<u64, SessionError> {
        self.inner.count(query).await
    }

    fn persist(&self, entity: &str, fields: FieldMap) -> StageTicket {
        self.inner.persist(entity, fields)
    }

    fn merge(&self, entity: &str, identifier: i64, fields: FieldMap) -> StageTicket {
        self.inner.merge(entity, identifier, fields)
    }

    fn remove(&self, entity: &str, identifier: i64) -> StageTicket {
        self.inner.remove(entity, identifier)
    }

    async fn flush(&self) -> Result<FlushReport, SessionError> {
        if self.contended.load(Ordering::SeqCst) {
            let mut broken = FieldMap::new();
            broken.insert("no_such_column".to_string(), Value::from(1));
            self.inner.persist("User", broken);
            assert!(self.inner.flush().await.is_err());
        }
        self.inner.flush().await
    }

    fn take_assigned(&self, ticket: StageTicket) -> Option<i64> {
        self.inner.take_assigned(ticket)
    }

    fn clear(&self) {
        self.inner.clear()
    }

    fn query_log(&self) -> Vec<QueryLogEntry> {
        self.inner.query_log()
    }
}

// ============================================================================
// Directory client
// ============================================================================

pub fn user_entry(login: &str, given: &str, family: &str) -> UserEntry {
    UserEntry {
        login: Login {
            username: login.to_string(),
            password: None,
            admin: false,
            suspended: false,
        },
        name: Name {
            given_name: given.to_string(),
            family_name: family.to_string(),
        },
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeMap<String, UserEntry>,
    calls: Vec<String>,
    saved: Vec<UserEntry>,
    unavailable: bool,
    reject_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockDirectoryClient {
    state: Arc<Mutex<DirectoryState>>,
}

impl MockDirectoryClient {
    pub fn with_users(users: Vec<UserEntry>) -> Self {
        let client = Self::default();
        {
            let mut state = client.state.lock().unwrap();
            for user in users {
                state.users.insert(user.login.username.clone(), user);
            }
        }
        client
    }

    pub fn set_unavailable(&self) {
        self.state.lock().unwrap().unavailable = true;
    }

    pub fn set_reject_writes(&self) {
        self.state.lock().unwrap().reject_writes = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn saved(&self) -> Vec<UserEntry> {
        self.state.lock().unwrap().saved.clone()
    }

    pub fn user(&self, login: &str) -> Option<UserEntry> {
        self.state.lock().unwrap().users.get(login).cloned()
    }

    fn rejected() -> DirectoryError {
        DirectoryError::Rejected {
            status: 400,
            message: "EntityExists".to_string(),
        }
    }
}

#[async_trait]
impl DirectoryClient for MockDirectoryClient {
    async fn list_users(&self) -> Result<Vec<UserEntry>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_users".to_string());
        if state.unavailable {
            return Err(DirectoryError::Transport("connection refused".to_string()));
        }
        Ok(state.users.values().cloned().collect())
    }

    async fn get_user(&self, login: &str) -> Result<UserEntry, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("get_user:{}", login));
        if state.unavailable {
            return Err(DirectoryError::Transport("connection refused".to_string()));
        }
        state
            .users
            .get(login)
            .cloned()
            .ok_or_else(|| DirectoryError::UserNotFound(login.to_string()))
    }

    async fn create_user(&self, user: &NewUser) -> Result<UserEntry, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_user:{}", user.username));
        if state.reject_writes || state.users.contains_key(&user.username) {
            return Err(Self::rejected());
        }
        let mut entry = user.to_entry();
        // The service never echoes passwords.
        entry.login.password = None;
        state.users.insert(user.username.clone(), entry.clone());
        Ok(entry)
    }

    async fn save_user(&self, login: &str, user: &UserEntry) -> Result<UserEntry, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("save_user:{}", login));
        if state.reject_writes {
            return Err(Self::rejected());
        }
        if state.users.remove(login).is_none() {
            return Err(DirectoryError::UserNotFound(login.to_string()));
        }
        state.saved.push(user.clone());
        let mut stored = user.clone();
        stored.login.password = None;
        state
            .users
            .insert(stored.login.username.clone(), stored.clone());
        Ok(stored)
    }

    async fn delete_user(&self, login: &str) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_user:{}", login));
        if state.reject_writes {
            return Err(Self::rejected());
        }
        state
            .users
            .remove(login)
            .map(|_| ())
            .ok_or_else(|| DirectoryError::UserNotFound(login.to_string()))
    }
}

// ============================================================================
// REST client
// ============================================================================

#[derive(Debug, Default)]
struct RestState {
    responses: BTreeMap<String, Value>,
    requests: Vec<RestRequest>,
    failures: VecDeque<u16>,
}

/// Serves canned JSON keyed by request path.
#[derive(Debug, Clone, Default)]
pub struct MockRestClient {
    state: Arc<Mutex<RestState>>,
}

impl MockRestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, body: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(path.to_string(), body);
        self
    }

    /// The next request fails with `status`.
    pub fn fail_next(&self, status: u16) {
        self.state.lock().unwrap().failures.push_back(status);
    }

    pub fn requests(&self) -> Vec<RestRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl RestClient for MockRestClient {
    async fn execute(&self, request: &RestRequest) -> Result<Value, RestError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        if let Some(status) = state.failures.pop_front() {
            return Err(RestError::Status {
                url: request.url.to_string(),
                status,
                message: "upstream failure".to_string(),
            });
        }
        state
            .responses
            .get(request.url.path())
            .cloned()
            .ok_or_else(|| RestError::NotFound(request.url.to_string()))
    }
}
