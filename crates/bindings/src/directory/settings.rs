//! Directory binding settings.

use std::fmt;

use crate::config::Settings;
use crate::core::BackendKind;
use crate::error::{BindingError, BindingResult};

/// Default login endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://www.google.com/accounts/ClientLogin";

/// Default user feed, with `{domain}` replaced by the directory domain.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://apps-apis.google.com/a/feeds/{domain}/user/2.0";

fn default_timeout_secs() -> u64 {
    30
}

/// Typed settings of a [`DirectoryApiBinding`](super::DirectoryApiBinding).
#[derive(Clone, PartialEq)]
pub struct DirectorySettings {
    /// Admin login.
    pub username: String,
    /// Admin password.
    pub password: String,
    /// Directory domain.
    pub domain: String,
    /// Explicit user endpoint, overriding the default for the domain.
    pub endpoint: Option<String>,
    /// Login endpoint.
    pub auth_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl DirectorySettings {
    /// Parses directory settings.
    ///
    /// Without a `domain`, the domain is the part of `username` after `@`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `username` or `password` is missing,
    /// or if no domain is given and `username` has none.
    pub fn from_settings(settings: &Settings) -> BindingResult<Self> {
        let backend = BackendKind::DirectoryApi;
        let username = settings.require_str(backend, "username")?;
        let password = settings.require_str(backend, "password")?;

        let domain = match settings.optional_str(backend, "domain")? {
            Some(domain) => domain,
            None => username
                .split('@')
                .nth(1)
                .filter(|domain| !domain.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    BindingError::configuration(
                        backend,
                        "missing directory domain: set 'domain' or use a username of the form user@domain",
                    )
                })?,
        };

        Ok(Self {
            username,
            password,
            domain,
            endpoint: settings.optional_str(backend, "endpoint")?,
            auth_url: settings
                .optional_str(backend, "auth_url")?
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            timeout_secs: settings
                .optional_u64(backend, "timeout_secs")?
                .unwrap_or_else(default_timeout_secs),
        })
    }

    /// The user endpoint.
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT_TEMPLATE.replace("{domain}", &self.domain))
    }
}

impl fmt::Debug for DirectorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySettings")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("endpoint", &self.endpoint)
            .field("auth_url", &self.auth_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
