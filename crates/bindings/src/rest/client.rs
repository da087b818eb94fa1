//! REST client contract and the HTTP client.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::types::Identifier;

use super::settings::{RestAuth, RestMethod, RestSettings, append_segments};

/// Errors raised by a REST client.
#[derive(Debug, Error)]
pub enum RestError {
    /// The endpoint answered 404.
    #[error("resource not found at {0}")]
    NotFound(String),

    /// The endpoint answered with another non-success status.
    #[error("request to {url} returned {status}: {message}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The request did not complete.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body is not JSON.
    #[error("cannot decode response: {0}")]
    Decode(String),
}

impl RestError {
    /// Returns `true` for [`RestError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RestError::NotFound(_))
    }
}

/// One request against a REST endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    /// Method.
    pub method: RestMethod,
    /// Target URL, without the query string.
    pub url: Url,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Authentication.
    pub auth: RestAuth,
}

impl RestRequest {
    /// The request configured by `settings`.
    pub fn from_settings(settings: &RestSettings) -> Self {
        Self {
            method: settings.method,
            url: settings.url.clone(),
            query: settings.query.clone(),
            headers: settings.headers.clone(),
            auth: settings.auth.clone(),
        }
    }

    /// A `GET` of `identifier` below this request's URL.
    ///
    /// Headers, query and authentication are kept.
    pub fn for_identifier(&self, identifier: &Identifier) -> Self {
        let mut url = self.url.clone();
        append_segments(&mut url, [identifier.to_string().as_str()]);
        Self {
            method: RestMethod::Get,
            url,
            ..self.clone()
        }
    }
}

/// Executes REST requests and decodes JSON responses.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Executes `request` and returns the decoded body.
    ///
    /// An empty body decodes to `null`.
    async fn execute(&self, request: &RestRequest) -> Result<Value, RestError>;

    /// Fetches `identifier` below the request's URL.
    async fn get(
        &self,
        request: &RestRequest,
        identifier: &Identifier,
    ) -> Result<Value, RestError> {
        self.execute(&request.for_identifier(identifier)).await
    }
}

#[cfg(feature = "rest")]
pub use http::HttpRestClient;

#[cfg(feature = "rest")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::{Method, StatusCode};
    use serde_json::Value;
    use tracing::{debug, instrument};

    use super::{RestClient, RestError, RestRequest};
    use crate::rest::settings::{RestAuth, RestMethod, RestSettings};

    fn method(method: RestMethod) -> Method {
        match method {
            RestMethod::Get => Method::GET,
            RestMethod::Post => Method::POST,
            RestMethod::Put => Method::PUT,
            RestMethod::Patch => Method::PATCH,
            RestMethod::Delete => Method::DELETE,
        }
    }

    fn transport(e: reqwest::Error) -> RestError {
        RestError::Transport(e.to_string())
    }

    /// REST client over reqwest.
    #[derive(Debug, Clone)]
    pub struct HttpRestClient {
        http: reqwest::Client,
    }

    impl HttpRestClient {
        /// Creates a client with the timeout from `settings`.
        pub fn new(settings: &RestSettings) -> Result<Self, RestError> {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .build()
                .map_err(transport)?;
            Ok(Self { http })
        }
    }

    #[async_trait]
    impl RestClient for HttpRestClient {
        #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
        async fn execute(&self, request: &RestRequest) -> Result<Value, RestError> {
            let mut builder = self
                .http
                .request(method(request.method), request.url.clone())
                .header(reqwest::header::ACCEPT, "application/json");
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder = match &request.auth {
                RestAuth::None => builder,
                RestAuth::Basic { username, password } => {
                    builder.basic_auth(username, Some(password))
                }
                RestAuth::Bearer { token } => builder.bearer_auth(token),
            };

            let response = builder.send().await.map_err(transport)?;
            let status = response.status();
            let body = response.text().await.map_err(transport)?;
            debug!(status = status.as_u16(), bytes = body.len(), "REST response");

            match status {
                StatusCode::NOT_FOUND => Err(RestError::NotFound(request.url.to_string())),
                s if !s.is_success() => Err(RestError::Status {
                    url: request.url.to_string(),
                    status: s.as_u16(),
                    message: body,
                }),
                _ if body.trim().is_empty() => Ok(Value::Null),
                _ => serde_json::from_str(&body).map_err(|e| RestError::Decode(e.to_string())),
            }
        }
    }
}
