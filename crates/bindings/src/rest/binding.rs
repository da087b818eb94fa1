//! The REST binding.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::{BackendKind, Binding, BindingCapability};
use crate::error::{BindingError, BindingResult};
use crate::mapping::{Mapped, map_json};
use crate::types::{Criteria, FieldMap, FindOptions, Found, Identifier, Model, Record};

use super::client::{RestClient, RestRequest};
use super::settings::RestSettings;

/// Read-only access to one REST resource.
///
/// `find` executes the configured request and `read` fetches one item
/// below the resource URL. Writes are not supported.
pub struct RestBinding<M = Record> {
    request: RestRequest,
    client: Arc<dyn RestClient>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> RestBinding<M> {
    /// Creates a binding backed by the HTTP REST client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `url` is missing or invalid.
    #[cfg(feature = "rest")]
    pub fn new(settings: Settings) -> BindingResult<Self> {
        let parsed = RestSettings::from_settings(&settings)?;
        let client = super::client::HttpRestClient::new(&parsed)
            .map_err(|e| BindingError::configuration(BackendKind::Rest, e.to_string()))?;
        Ok(Self::from_parts(&parsed, Arc::new(client)))
    }

    /// Creates a binding over an existing client.
    pub fn with_client(settings: Settings, client: Arc<dyn RestClient>) -> BindingResult<Self> {
        let parsed = RestSettings::from_settings(&settings)?;
        Ok(Self::from_parts(&parsed, client))
    }

    fn from_parts(settings: &RestSettings, client: Arc<dyn RestClient>) -> Self {
        info!(url = %settings.url, method = %settings.method, "Constructed REST binding");
        Self {
            request: RestRequest::from_settings(settings),
            client,
            _model: PhantomData,
        }
    }

    /// The configured request.
    pub fn request(&self) -> &RestRequest {
        &self.request
    }

    fn target(&self) -> String {
        self.request.url.to_string()
    }
}

#[async_trait]
impl<M: Model> Binding<M> for RestBinding<M> {
    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }

    fn supports(&self, capability: BindingCapability) -> bool {
        matches!(capability, BindingCapability::Find | BindingCapability::Read)
    }

    async fn find(&self, criteria: &Criteria, options: &FindOptions) -> BindingResult<Found<M>> {
        if !criteria.is_empty() || !options.is_empty() {
            warn!(
                url = %self.request.url,
                "REST find runs the configured request; criteria and options ignored"
            );
        }

        let payload = self
            .client
            .execute(&self.request)
            .await
            .map_err(|e| BindingError::query_failure(self.target(), e))?;

        Ok(match payload {
            Value::Null => Found::Nothing,
            Value::Array(items) if items.iter().all(Value::is_object) => {
                let models = items
                    .into_iter()
                    .filter_map(|item| match map_json(item) {
                        Mapped::Model(model) => Some(model),
                        Mapped::Scalar(_) | Mapped::List(_) => None,
                    })
                    .collect::<Vec<M>>();
                debug!(count = models.len(), "Mapped REST collection");
                Found::Models(models)
            }
            other => Found::Raw(other),
        })
    }

    async fn create(&self, _fields: FieldMap) -> BindingResult<M> {
        Err(BindingError::unsupported(BackendKind::Rest, "create"))
    }

    async fn read(&self, identifier: &Identifier) -> BindingResult<M> {
        let payload = self
            .client
            .get(&self.request, identifier)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    BindingError::not_found(self.target(), identifier).with_cause(e)
                } else {
                    BindingError::query_failure(self.target(), e)
                }
            })?;

        match map_json::<M>(payload) {
            Mapped::Model(mut model) => {
                if model.identifier().is_none() {
                    model.set_identifier(identifier.clone());
                }
                Ok(model)
            }
            Mapped::Scalar(_) | Mapped::List(_) => Err(BindingError::QueryFailure {
                target: self.target(),
                message: format!("payload for '{}' is not an object", identifier),
                source: None,
            }),
        }
    }

    async fn refresh(&self, _model: &mut M) -> BindingResult<bool> {
        Err(BindingError::unsupported(BackendKind::Rest, "refresh"))
    }

    async fn update(&self, _model: &M) -> BindingResult<M> {
        Err(BindingError::unsupported(BackendKind::Rest, "update"))
    }

    async fn delete(&self, _model: &M) -> BindingResult<bool> {
        Err(BindingError::unsupported(BackendKind::Rest, "delete"))
    }
}

impl<M> std::fmt::Debug for RestBinding<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBinding")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}
