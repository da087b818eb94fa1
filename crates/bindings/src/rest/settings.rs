//! REST binding settings.

use std::fmt;

use url::Url;

use crate::config::Settings;
use crate::core::BackendKind;
use crate::error::{BindingError, BindingResult};

fn default_timeout_secs() -> u64 {
    30
}

/// HTTP method of the configured request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestMethod {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl RestMethod {
    /// Parses a method name, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(RestMethod::Get),
            "POST" => Some(RestMethod::Post),
            "PUT" => Some(RestMethod::Put),
            "PATCH" => Some(RestMethod::Patch),
            "DELETE" => Some(RestMethod::Delete),
            _ => None,
        }
    }

    /// The method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Put => "PUT",
            RestMethod::Patch => "PATCH",
            RestMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication sent with every request.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum RestAuth {
    /// No `Authorization` header.
    #[default]
    None,
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password, possibly empty.
        password: String,
    },
    /// Bearer token.
    Bearer {
        /// The token.
        token: String,
    },
}

impl fmt::Debug for RestAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestAuth::None => f.write_str("None"),
            RestAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            RestAuth::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Typed settings of a [`RestBinding`](super::RestBinding).
#[derive(Debug, Clone, PartialEq)]
pub struct RestSettings {
    /// Resource URL: `url` with `resource` appended.
    pub url: Url,
    /// Method of the configured request.
    pub method: RestMethod,
    /// Query parameters of the configured request.
    pub query: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Authentication.
    pub auth: RestAuth,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl RestSettings {
    /// Parses REST settings.
    ///
    /// `resource` is appended to `url` path segment by path segment.
    /// `username` selects basic authentication; otherwise `token` selects a
    /// bearer token.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `url` is missing or not an absolute
    /// URL, if `method` is unknown, or if `query` or `headers` is not a map
    /// of scalars.
    pub fn from_settings(settings: &Settings) -> BindingResult<Self> {
        let backend = BackendKind::Rest;
        let raw = settings.require_str(backend, "url")?;
        let mut url = Url::parse(raw.trim()).map_err(|e| {
            BindingError::configuration(backend, format!("invalid url '{}': {}", raw, e))
        })?;
        if url.cannot_be_a_base() {
            return Err(BindingError::configuration(
                backend,
                format!("url '{}' cannot carry a resource path", raw),
            ));
        }

        if let Some(resource) = settings.optional_str(backend, "resource")? {
            append_segments(&mut url, resource.split('/'));
        }

        let method = match settings.optional_str(backend, "method")? {
            None => RestMethod::default(),
            Some(name) => RestMethod::parse(&name).ok_or_else(|| {
                BindingError::configuration(backend, format!("unsupported method '{}'", name))
            })?,
        };

        let auth = match (
            settings.optional_str(backend, "username")?,
            settings.optional_str(backend, "token")?,
        ) {
            (Some(username), _) => RestAuth::Basic {
                username,
                password: settings.optional_str(backend, "password")?.unwrap_or_default(),
            },
            (None, Some(token)) => RestAuth::Bearer { token },
            (None, None) => RestAuth::None,
        };

        Ok(Self {
            url,
            method,
            query: settings.optional_string_map(backend, "query")?,
            headers: settings.optional_string_map(backend, "headers")?,
            auth,
            timeout_secs: settings
                .optional_u64(backend, "timeout_secs")?
                .unwrap_or_else(default_timeout_secs),
        })
    }
}

/// Appends non-empty `segments` to the path of `url`.
pub(crate) fn append_segments<'a>(url: &mut Url, segments: impl IntoIterator<Item = &'a str>) {
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty();
        for segment in segments.into_iter().filter(|s| !s.is_empty()) {
            path.push(segment);
        }
    }
}
