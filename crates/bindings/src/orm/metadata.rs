//! Entity metadata: which table an entity lives in and how its columns decode.
//!
//! Metadata files are JSON documents named `<Entity>.json`:
//!
//! ```json
//! {
//!   "table": "users",
//!   "identifier": "id",
//!   "columns": { "id": "integer", "active": "boolean", "tags": "json" }
//! }
//! ```
//!
//! Columns that are not listed decode by their SQLite storage class.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::SessionError;
use super::settings::SessionConfig;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 64-bit integer.
    Integer,
    /// Floating point.
    Real,
    /// Text.
    Text,
    /// Boolean stored as 0/1.
    Boolean,
    /// JSON document stored as text.
    Json,
}

/// Mapping of one entity onto a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name.
    #[serde(skip)]
    pub entity: String,

    /// Table name.
    #[serde(default)]
    pub table: String,

    /// Integer primary key column.
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Declared column types.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnType>,
}

fn default_identifier() -> String {
    "id".to_string()
}

impl EntityMetadata {
    /// Metadata for an entity with no metadata file: table named after the
    /// entity, keyed by `id`.
    pub fn inferred(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            table: entity.clone(),
            entity,
            identifier: default_identifier(),
            columns: BTreeMap::new(),
        }
    }

    /// Returns the declared type of `column`.
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }
}

/// Loads entity metadata, caching it when the session is configured to.
#[derive(Debug)]
pub struct MetadataLoader {
    dir: Option<PathBuf>,
    cache: Option<Mutex<HashMap<String, Arc<EntityMetadata>>>>,
}

impl MetadataLoader {
    /// Creates a loader for `config`.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            dir: config.metadata_dir.clone(),
            cache: config.caches_metadata().then(|| Mutex::new(HashMap::new())),
        }
    }

    /// Returns the metadata of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownEntity`] if a metadata directory is
    /// configured and has no file for the entity.
    pub fn load(&self, entity: &str) -> Result<Arc<EntityMetadata>, SessionError> {
        if let Some(cache) = &self.cache {
            if let Some(metadata) = cache.lock().get(entity) {
                return Ok(Arc::clone(metadata));
            }
        }

        let metadata = Arc::new(self.read(entity)?);

        if let Some(cache) = &self.cache {
            cache.lock().insert(entity.to_string(), Arc::clone(&metadata));
        }
        Ok(metadata)
    }

    /// Number of cached entries, or `None` if caching is off.
    pub fn cached(&self) -> Option<usize> {
        self.cache.as_ref().map(|cache| cache.lock().len())
    }

    fn read(&self, entity: &str) -> Result<EntityMetadata, SessionError> {
        let Some(dir) = &self.dir else {
            return Ok(EntityMetadata::inferred(entity));
        };

        let path = dir.join(format!("{}.json", entity));
        debug!(entity, path = %path.display(), "Loading entity metadata");

        let text = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SessionError::UnknownEntity(entity.to_string())
            } else {
                SessionError::Metadata {
                    entity: entity.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let mut metadata: EntityMetadata =
            serde_json::from_str(&text).map_err(|e| SessionError::Metadata {
                entity: entity.to_string(),
                message: e.to_string(),
            })?;
        metadata.entity = entity.to_string();
        if metadata.table.is_empty() {
            metadata.table = entity.to_string();
        }
        Ok(metadata)
    }
}
