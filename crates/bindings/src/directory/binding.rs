//! The directory-service binding.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::{BackendKind, Binding, BindingCapability};
use crate::error::{BindingError, BindingResult};
use crate::types::{Criteria, FieldMap, FindOptions, Found, Identifier, Model, Record};

use super::client::{DirectoryClient, DirectoryError, NewUser, UserEntry};
use super::mapping::{apply_model, map_entry, model_login};
use super::settings::DirectorySettings;

/// Error target for directory users.
const TARGET: &str = "directory user";

/// Fields `create` requires.
const CREATE_FIELDS: [&str; 4] = ["username", "given_name", "family_name", "password"];

/// CRUD access to the users of a hosted directory domain.
///
/// Each binding owns its client; nothing is shared through the registry.
/// Users are identified by login.
pub struct DirectoryApiBinding<M = Record> {
    settings: DirectorySettings,
    client: Arc<dyn DirectoryClient>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> DirectoryApiBinding<M> {
    /// Creates a binding backed by the HTTP directory client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if credentials or domain are missing,
    /// or if the endpoint is not a usable URL.
    #[cfg(feature = "directory")]
    pub fn new(settings: Settings) -> BindingResult<Self> {
        let parsed = DirectorySettings::from_settings(&settings)?;
        let client = super::client::HttpDirectoryClient::new(&parsed)
            .map_err(|e| BindingError::configuration(BackendKind::DirectoryApi, e.to_string()))?;
        Ok(Self::from_parts(parsed, Arc::new(client)))
    }

    /// Creates a binding over an existing client.
    pub fn with_client(
        settings: Settings,
        client: Arc<dyn DirectoryClient>,
    ) -> BindingResult<Self> {
        let parsed = DirectorySettings::from_settings(&settings)?;
        Ok(Self::from_parts(parsed, client))
    }

    fn from_parts(settings: DirectorySettings, client: Arc<dyn DirectoryClient>) -> Self {
        info!(
            domain = %settings.domain,
            endpoint = %settings.endpoint(),
            "Constructed directory binding"
        );
        Self {
            settings,
            client,
            _model: PhantomData,
        }
    }

    /// Parsed settings.
    pub fn settings(&self) -> &DirectorySettings {
        &self.settings
    }

    /// Reads a user without mapping it into a model.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::NotFound`] carrying the client error for any
    /// failure.
    pub async fn read_raw(&self, identifier: &Identifier) -> BindingResult<UserEntry> {
        let login = identifier.to_string();
        self.client
            .get_user(&login)
            .await
            .map_err(|e| BindingError::not_found(TARGET, &login).with_cause(e))
    }

    fn new_user(fields: &FieldMap) -> BindingResult<NewUser> {
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let missing: Vec<&str> = CREATE_FIELDS
            .iter()
            .copied()
            .filter(|key| text(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(BindingError::CreateFailure {
                target: TARGET.to_string(),
                message: format!("missing fields: {}", missing.join(", ")),
                source: None,
            });
        }

        Ok(NewUser {
            username: text("username").unwrap_or_default(),
            given_name: text("given_name").unwrap_or_default(),
            family_name: text("family_name").unwrap_or_default(),
            password: text("password").unwrap_or_default(),
        })
    }
}

#[async_trait]
impl<M: Model> Binding<M> for DirectoryApiBinding<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::DirectoryApi
    }

    fn supports(&self, capability: BindingCapability) -> bool {
        !matches!(
            capability,
            BindingCapability::Refresh
                | BindingCapability::Criteria
                | BindingCapability::Paging
                | BindingCapability::Extensions
        )
    }

    async fn find(&self, criteria: &Criteria, options: &FindOptions) -> BindingResult<Found<M>> {
        if !criteria.is_empty() || !options.is_empty() {
            warn!(
                domain = %self.settings.domain,
                "Directory find lists every user; criteria and options ignored"
            );
        }

        let users = self
            .client
            .list_users()
            .await
            .map_err(|e| BindingError::query_failure(TARGET, e))?;
        debug!(count = users.len(), "Listed directory users");

        if users.is_empty() {
            return Ok(Found::Nothing);
        }
        Ok(Found::Models(users.iter().map(map_entry).collect()))
    }

    async fn create(&self, fields: FieldMap) -> BindingResult<M> {
        let user = Self::new_user(&fields)?;
        let created = self.client.create_user(&user).await.map_err(|e| {
            BindingError::CreateFailure {
                target: TARGET.to_string(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            }
        })?;
        debug!(username = %created.login.username, "Created directory user");
        Ok(map_entry(&created))
    }

    async fn read(&self, identifier: &Identifier) -> BindingResult<M> {
        let entry = self.read_raw(identifier).await?;
        Ok(map_entry(&entry))
    }

    async fn refresh(&self, _model: &mut M) -> BindingResult<bool> {
        Ok(false)
    }

    async fn update(&self, model: &M) -> BindingResult<M> {
        let login = model_login(model).ok_or_else(|| BindingError::UpdateFailure {
            target: TARGET.to_string(),
            message: "model has no login".to_string(),
            source: None,
        })?;

        let mut entry = self.read_raw(&Identifier::Text(login.clone())).await?;
        apply_model(&model.fields(), &mut entry);

        let saved = self.client.save_user(&login, &entry).await.map_err(|e| {
            BindingError::UpdateFailure {
                target: TARGET.to_string(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            }
        })?;
        debug!(username = %login, saved_as = %saved.login.username, "Saved directory user");
        Ok(map_entry(&saved))
    }

    async fn delete(&self, model: &M) -> BindingResult<bool> {
        let login = model_login(model).ok_or_else(|| BindingError::DeleteFailure {
            target: TARGET.to_string(),
            message: "model has no login".to_string(),
            source: None,
        })?;

        match self.client.delete_user(&login).await {
            Ok(()) => {
                debug!(username = %login, "Deleted directory user");
                Ok(true)
            }
            Err(e @ DirectoryError::UserNotFound(_)) => {
                Err(BindingError::not_found(TARGET, &login).with_cause(e))
            }
            Err(e) => Err(BindingError::DeleteFailure {
                target: TARGET.to_string(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            }),
        }
    }
}

impl<M> std::fmt::Debug for DirectoryApiBinding<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryApiBinding")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
