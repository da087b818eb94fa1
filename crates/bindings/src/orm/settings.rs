//! ORM binding settings and the session configuration derived from them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Settings;
use crate::core::BackendKind;
use crate::error::{BindingError, BindingResult};

/// Environment variable naming the deployment environment.
///
/// Development mode is on unless it is set to `production`.
pub const DEPLOYMENT_ENV_VAR: &str = "HELIOS_BINDINGS_ENV";

/// Settings keys applied while configuring the session and then removed.
const CONSUMED_KEYS: [&str; 4] = ["meta_cache", "query_cache", "proxy_dir", "proxy_namespace"];

/// Cache implementation for metadata or prepared statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    /// No caching.
    #[default]
    None,
    /// Process-local in-memory cache.
    Memory,
}

impl CacheKind {
    fn parse(key: &str, value: Option<String>) -> BindingResult<Self> {
        match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("none") => Ok(CacheKind::None),
            Some("memory") | Some("array") => Ok(CacheKind::Memory),
            Some(other) => Err(BindingError::configuration(
                BackendKind::Orm,
                format!("unsupported {} '{}' (expected 'memory' or 'none')", key, other),
            )),
        }
    }
}

/// Typed settings of an [`OrmBinding`](super::OrmBinding).
#[derive(Debug, Clone, PartialEq)]
pub struct OrmSettings {
    /// Entity the binding reads and writes.
    pub entity: String,
    /// Session configuration shared by every binding of the registry.
    pub session: SessionConfig,
}

impl OrmSettings {
    /// Parses ORM settings, removing the keys consumed by session setup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `class` or `path` is missing, or if
    /// an optional setting has the wrong type.
    pub fn from_settings(settings: &mut Settings) -> BindingResult<Self> {
        let backend = BackendKind::Orm;
        let entity = settings.require_str(backend, "class")?;
        let path = settings.require_str(backend, "path")?;

        let dev_mode = match settings.optional_bool(backend, "dev_mode")? {
            Some(dev_mode) => dev_mode,
            None => !is_production(),
        };
        let meta_cache =
            CacheKind::parse("meta_cache", settings.optional_str(backend, "meta_cache")?)?;
        let query_cache =
            CacheKind::parse("query_cache", settings.optional_str(backend, "query_cache")?)?;

        let proxy_dir = settings.optional_str(backend, "proxy_dir")?;
        let proxy_namespace = settings.optional_str(backend, "proxy_namespace")?;
        if proxy_dir.is_some() || proxy_namespace.is_some() {
            warn!(
                proxy_dir = proxy_dir.as_deref(),
                proxy_namespace = proxy_namespace.as_deref(),
                "Proxy options do not apply to the SQLite session and are ignored"
            );
        }

        let mut session = SessionConfig::new(path);
        session.metadata_dir = settings.optional_str(backend, "metadata_dir")?.map(PathBuf::from);
        session.dev_mode = dev_mode;
        session.meta_cache = meta_cache;
        session.query_cache = query_cache;
        if let Some(max) = settings.optional_u64(backend, "max_connections")? {
            session.max_connections = u32::try_from(max).unwrap_or(u32::MAX).max(1);
        }
        if let Some(timeout) = settings.optional_u64(backend, "busy_timeout_ms")? {
            session.busy_timeout_ms = timeout;
        }

        for key in CONSUMED_KEYS {
            settings.take(key);
        }

        Ok(Self { entity, session })
    }
}

fn is_production() -> bool {
    std::env::var(DEPLOYMENT_ENV_VAR)
        .map(|env| env.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}

/// Configuration of the shared ORM session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// SQLite database file, or `:memory:`.
    pub path: String,

    /// Directory holding one `<Entity>.json` metadata file per entity.
    ///
    /// Without it, an entity maps to the table of the same name keyed by `id`.
    #[serde(default)]
    pub metadata_dir: Option<PathBuf>,

    /// Development mode reloads metadata on every use unless it is cached.
    #[serde(default = "default_true")]
    pub dev_mode: bool,

    /// Metadata cache.
    #[serde(default)]
    pub meta_cache: CacheKind,

    /// Prepared statement cache.
    #[serde(default)]
    pub query_cache: CacheKind,

    /// Maximum number of pooled connections (forced to 1 for `:memory:`).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Number of statements kept in the query log.
    #[serde(default = "default_query_log_capacity")]
    pub query_log_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_query_log_capacity() -> usize {
    256
}

impl SessionConfig {
    /// Creates a development-mode configuration for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata_dir: None,
            dev_mode: true,
            meta_cache: CacheKind::None,
            query_cache: CacheKind::None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            query_log_capacity: default_query_log_capacity(),
        }
    }

    /// Returns `true` for an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }

    /// Returns `true` if loaded metadata is kept for reuse.
    ///
    /// Production mode always caches.
    pub fn caches_metadata(&self) -> bool {
        self.meta_cache == CacheKind::Memory || !self.dev_mode
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ErrorKind;

    use super::*;

    fn base() -> Settings {
        Settings::new().with("class", "User").with("path", ":memory:")
    }

    #[test]
    fn test_requires_class_and_path() {
        let mut settings = Settings::new().with("path", ":memory:");
        let err = OrmSettings::from_settings(&mut settings).unwrap_err();
        assert!(err.to_string().contains("'class'"));

        let mut settings = Settings::new().with("class", "User");
        let err = OrmSettings::from_settings(&mut settings).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("'path'"));
    }

    #[test]
    fn test_consumed_keys_are_stripped() {
        let mut settings = base()
            .with("meta_cache", "memory")
            .with("query_cache", "memory")
            .with("proxy_dir", "/tmp/proxies")
            .with("proxy_namespace", "Proxies")
            .with("dev_mode", false);

        let parsed = OrmSettings::from_settings(&mut settings).unwrap();

        assert_eq!(parsed.entity, "User");
        assert_eq!(parsed.session.meta_cache, CacheKind::Memory);
        assert_eq!(parsed.session.query_cache, CacheKind::Memory);
        assert!(!parsed.session.dev_mode);
        for key in CONSUMED_KEYS {
            assert!(!settings.contains(key), "{} should be stripped", key);
        }
        assert!(settings.contains("class"));
    }

    #[test]
    fn test_unknown_cache_kind_is_rejected() {
        let mut settings = base().with("meta_cache", "apc");
        assert!(OrmSettings::from_settings(&mut settings).is_err());
    }

    #[test]
    fn test_tuning_settings() {
        let mut settings = base()
            .with("max_connections", 0)
            .with("busy_timeout_ms", json!("250"))
            .with("metadata_dir", "/etc/entities");

        let parsed = OrmSettings::from_settings(&mut settings).unwrap();
        assert_eq!(parsed.session.max_connections, 1);
        assert_eq!(parsed.session.busy_timeout_ms, 250);
        assert_eq!(parsed.session.metadata_dir, Some(PathBuf::from("/etc/entities")));
    }

    #[test]
    fn test_production_caches_metadata() {
        let mut config = SessionConfig::new(":memory:");
        assert!(config.is_memory());
        assert!(!config.caches_metadata());

        config.dev_mode = false;
        assert!(config.caches_metadata());

        config.dev_mode = true;
        config.meta_cache = CacheKind::Memory;
        assert!(config.caches_metadata());
    }
}
