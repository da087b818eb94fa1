//! The ORM binding.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::Settings;
use crate::core::{BackendKind, Binding, BindingCapability};
use crate::error::{BindingError, BindingResult, BoxedCause};
use crate::mapping::populate_new;
use crate::registry::ConnectionRegistry;
use crate::types::{Criteria, FieldMap, FindOptions, Found, Identifier, Model, Record};

use super::extension::{Extension, ExtensionOutput, RepositoryOp, SessionOp};
use super::query::CriteriaTranslator;
use super::repository::Repository;
use super::session::{OrmSession, QueryLogEntry, SessionError, SessionFactory, StageTicket};
use super::settings::{OrmSettings, SessionConfig};

/// The registry entry for the ORM backend kind.
#[derive(Debug)]
pub struct SharedSession {
    session: Arc<dyn OrmSession>,
    config: SessionConfig,
}

impl SharedSession {
    /// The session.
    pub fn session(&self) -> &Arc<dyn OrmSession> {
        &self.session
    }

    /// The configuration the session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// CRUD access to one entity of the shared ORM session.
///
/// Every `OrmBinding` built against the same [`ConnectionRegistry`] shares
/// one session, opened by whichever binding was constructed first. Later
/// constructions reuse that session even if their session settings differ.
///
/// # Example
///
/// ```no_run
/// use helios_bindings::config::Settings;
/// use helios_bindings::core::Binding;
/// use helios_bindings::orm::OrmBinding;
/// use helios_bindings::registry::ConnectionRegistry;
/// use helios_bindings::types::{Identifier, Model, Record};
/// use serde_json::json;
///
/// # async fn example() -> helios_bindings::BindingResult<()> {
/// let settings = Settings::new()
///     .with("class", "User")
///     .with("path", "app.db");
/// let users: OrmBinding<Record> = OrmBinding::new(ConnectionRegistry::global(), settings).await?;
///
/// let created = users
///     .create(json!({"name": "Alice"}).as_object().cloned().unwrap_or_default())
///     .await?;
/// let _again = users.read(&created.identifier().unwrap_or(Identifier::from(0))).await?;
/// # Ok(())
/// # }
/// ```
pub struct OrmBinding<M = Record> {
    entity: String,
    session: Arc<dyn OrmSession>,
    translator: Arc<CriteriaTranslator>,
    settings: Settings,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> OrmBinding<M> {
    /// Creates a binding backed by the SQLite session.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `class` or `path` is missing, or if
    /// the shared session cannot be opened.
    #[cfg(feature = "sqlite")]
    pub async fn new(registry: &ConnectionRegistry, settings: Settings) -> BindingResult<Self> {
        let factory = crate::backends::sqlite::SqliteSessionFactory::new();
        Self::with_factory(registry, settings, &factory).await
    }

    /// Creates a binding whose shared session, if not yet open, comes from
    /// `factory`.
    pub async fn with_factory<F>(
        registry: &ConnectionRegistry,
        mut settings: Settings,
        factory: &F,
    ) -> BindingResult<Self>
    where
        F: SessionFactory + ?Sized,
    {
        let OrmSettings { entity, session: config } = OrmSettings::from_settings(&mut settings)?;

        let translator = CriteriaTranslator::new()
            .map_err(|e| BindingError::configuration(BackendKind::Orm, e.to_string()))?;
        if !translator.is_identifier(&entity) {
            return Err(BindingError::configuration(
                BackendKind::Orm,
                format!("'{}' is not a valid entity name", entity),
            ));
        }

        let shared = registry
            .get_or_try_init(BackendKind::Orm, || async {
                let session = factory.open(&config).await.map_err(|e| {
                    BindingError::configuration(
                        BackendKind::Orm,
                        format!("cannot open session at '{}': {}", config.path, e),
                    )
                })?;
                info!(
                    path = %config.path,
                    dev_mode = config.dev_mode,
                    meta_cache = ?config.meta_cache,
                    query_cache = ?config.query_cache,
                    "Opened shared ORM session"
                );
                Ok(SharedSession {
                    session,
                    config: config.clone(),
                })
            })
            .await?;

        if shared.config != config {
            debug!(
                entity = %entity,
                path = %shared.config.path,
                "Reusing the shared session; this binding's session settings are ignored"
            );
        }

        info!(entity = %entity, "Constructed ORM binding");

        Ok(Self {
            entity,
            session: Arc::clone(&shared.session),
            translator: Arc::new(translator),
            settings,
            _model: PhantomData,
        })
    }

    /// Entity this binding reads and writes.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Settings left after session setup consumed its keys.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The shared session.
    pub fn session(&self) -> &Arc<dyn OrmSession> {
        &self.session
    }

    /// Query repository for this binding's entity.
    pub fn repository(&self) -> Repository<M> {
        Repository::new(
            self.entity.clone(),
            Arc::clone(&self.session),
            Arc::clone(&self.translator),
        )
    }

    /// Counts records matching `criteria`.
    pub async fn count(&self, criteria: &Criteria) -> BindingResult<u64> {
        self.repository().count(criteria).await
    }

    /// Returns the first record matching `criteria`.
    pub async fn find_one_by(&self, criteria: &Criteria) -> BindingResult<Option<M>> {
        self.repository().find_one_by(criteria).await
    }

    /// Returns every record.
    pub async fn find_all(&self) -> BindingResult<Vec<M>> {
        self.repository().find_all().await
    }

    /// Discards writes staged on the shared session.
    pub fn clear(&self) {
        self.session.clear();
    }

    /// Statements recently executed by the shared session.
    pub fn query_log(&self) -> Vec<QueryLogEntry> {
        self.session.query_log()
    }

    /// Runs a named session or repository operation.
    ///
    /// `criteria` is passed to repository operations that filter.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::UnknownOperation`] if neither the session nor
    /// the repository offers `name`.
    pub async fn call(&self, name: &str, criteria: &Criteria) -> BindingResult<ExtensionOutput<M>> {
        let extension = Extension::resolve(name).ok_or_else(|| BindingError::UnknownOperation {
            backend: BackendKind::Orm,
            operation: name.to_string(),
        })?;
        debug!(entity = %self.entity, operation = %extension, "Calling extension operation");

        match extension {
            Extension::Session(SessionOp::Clear) => {
                self.clear();
                Ok(ExtensionOutput::Unit)
            }
            Extension::Session(SessionOp::QueryLog) => {
                Ok(ExtensionOutput::QueryLog(self.query_log()))
            }
            Extension::Repository(RepositoryOp::Count) => {
                Ok(ExtensionOutput::Count(self.count(criteria).await?))
            }
            Extension::Repository(RepositoryOp::FindOneBy) => {
                Ok(ExtensionOutput::Model(self.find_one_by(criteria).await?))
            }
            Extension::Repository(RepositoryOp::FindAll) => {
                Ok(ExtensionOutput::Models(self.find_all().await?))
            }
        }
    }

    /// Flushes the shared session and claims the outcome of `ticket`.
    ///
    /// The session flushes every staged write, so another caller's flush may
    /// carry this one. If that flush failed the write was discarded and no
    /// identifier is left to claim.
    async fn commit(&self, ticket: StageTicket, operation: Write) -> BindingResult<i64> {
        self.session
            .flush()
            .await
            .map_err(|e| write_failure(&self.entity, operation, e))?;

        self.session.take_assigned(ticket).ok_or_else(|| {
            write_failure_message(
                &self.entity,
                operation,
                "the staged write was discarded by a failed flush",
            )
        })
    }

    fn numeric_identifier(&self, model: &M) -> Option<i64> {
        model.identifier().and_then(|id| id.as_numeric())
    }
}

/// Translates a failed flush into the error of the verb that staged it.
fn write_failure(entity: &str, operation: Write, err: SessionError) -> BindingError {
    if let SessionError::RowNotFound { identifier, .. } = &err {
        if operation != Write::Create {
            let identifier = *identifier;
            return BindingError::not_found(entity, identifier).with_cause(err);
        }
    }

    let message = err.to_string();
    write_failure_with(entity, operation, message, Some(err.into()))
}

fn write_failure_message(entity: &str, operation: Write, message: &str) -> BindingError {
    write_failure_with(entity, operation, message.to_string(), None)
}

fn write_failure_with(
    entity: &str,
    operation: Write,
    message: String,
    source: Option<BoxedCause>,
) -> BindingError {
    let target = entity.to_string();
    match operation {
        Write::Create => BindingError::CreateFailure { target, message, source },
        Write::Update => BindingError::UpdateFailure { target, message, source },
        Write::Delete => BindingError::DeleteFailure { target, message, source },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Create,
    Update,
    Delete,
}

#[async_trait]
impl<M: Model> Binding<M> for OrmBinding<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::Orm
    }

    fn supports(&self, capability: BindingCapability) -> bool {
        !matches!(capability, BindingCapability::Refresh)
    }

    async fn find(&self, criteria: &Criteria, options: &FindOptions) -> BindingResult<Found<M>> {
        let repository = self.repository();
        if criteria.is_empty() {
            if !options.is_empty() {
                debug!(
                    entity = %self.entity,
                    "Find without criteria returns every row; options ignored"
                );
            }
            return Ok(Found::Models(repository.find_all().await?));
        }
        Ok(Found::Models(repository.find_by(criteria, options).await?))
    }

    async fn create(&self, fields: FieldMap) -> BindingResult<M> {
        let model: M = populate_new(fields);
        let ticket = self.session.persist(&self.entity, model.fields());
        let identifier = self.commit(ticket, Write::Create).await?;
        debug!(entity = %self.entity, identifier, "Created row");

        self.read(&Identifier::Numeric(identifier)).await
    }

    async fn read(&self, identifier: &Identifier) -> BindingResult<M> {
        let Some(id) = identifier.as_numeric() else {
            return Err(BindingError::unsupported(
                BackendKind::Orm,
                "read by non-numeric identifier",
            ));
        };

        self.repository()
            .find(id)
            .await?
            .ok_or_else(|| BindingError::not_found(&self.entity, id))
    }

    async fn refresh(&self, _model: &mut M) -> BindingResult<bool> {
        Err(BindingError::unsupported(BackendKind::Orm, "refresh"))
    }

    async fn update(&self, model: &M) -> BindingResult<M> {
        let id = self
            .numeric_identifier(model)
            .ok_or_else(|| BindingError::UpdateFailure {
                target: self.entity.clone(),
                message: "model has no numeric identifier".to_string(),
                source: None,
            })?;

        let ticket = self.session.merge(&self.entity, id, model.fields());
        self.commit(ticket, Write::Update).await?;

        self.read(&Identifier::Numeric(id)).await
    }

    async fn delete(&self, model: &M) -> BindingResult<bool> {
        let id = self
            .numeric_identifier(model)
            .ok_or_else(|| BindingError::DeleteFailure {
                target: self.entity.clone(),
                message: "model has no numeric identifier".to_string(),
                source: None,
            })?;

        let ticket = self.session.remove(&self.entity, id);
        self.commit(ticket, Write::Delete).await?;
        debug!(entity = %self.entity, identifier = id, "Deleted row");

        Ok(true)
    }
}

impl<M> std::fmt::Debug for OrmBinding<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrmBinding")
            .field("entity", &self.entity)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
