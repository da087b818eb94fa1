//! Translating binding criteria into entity queries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BindingError, BindingResult};
use crate::types::{Criteria, FindOptions, OrderBy};

/// Pattern every field, table and entity name must match.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// A backend-agnostic query against one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Entity name.
    pub entity: String,
    /// Equality filters, AND-combined, in field-name order.
    pub filters: Vec<(String, Value)>,
    /// Sort keys.
    pub order: Vec<OrderBy>,
    /// Maximum rows.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
}

impl EntityQuery {
    /// A query selecting every row of `entity`.
    pub fn all(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

/// Validates names and builds [`EntityQuery`] values.
#[derive(Debug, Clone)]
pub struct CriteriaTranslator {
    identifier_pattern: regex::Regex,
}

impl CriteriaTranslator {
    /// Creates a translator accepting plain identifiers.
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_pattern(IDENTIFIER_PATTERN)
    }

    /// Creates a translator accepting names that match `pattern`.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        let identifier_pattern = regex::Regex::new(pattern)?;
        Ok(Self { identifier_pattern })
    }

    /// Returns `true` if `name` may be used as a field, table or entity name.
    pub fn is_identifier(&self, name: &str) -> bool {
        self.identifier_pattern.is_match(name)
    }

    /// Builds the query for `criteria` and `options` against `entity`.
    ///
    /// # Errors
    ///
    /// Returns a query failure naming the first field that is not a plain
    /// identifier. Nothing reaches the backend in that case.
    pub fn translate(
        &self,
        entity: &str,
        criteria: &Criteria,
        options: &FindOptions,
    ) -> BindingResult<EntityQuery> {
        self.check(entity, entity)?;

        let mut filters = Vec::new();
        for (field, value) in criteria.iter() {
            self.check(entity, field)?;
            filters.push((field.clone(), value.clone()));
        }
        for key in &options.order {
            self.check(entity, &key.field)?;
        }

        Ok(EntityQuery {
            entity: entity.to_string(),
            filters,
            order: options.order.clone(),
            limit: options.limit,
            offset: options.offset,
        })
    }

    fn check(&self, entity: &str, name: &str) -> BindingResult<()> {
        if self.is_identifier(name) {
            Ok(())
        } else {
            Err(BindingError::QueryFailure {
                target: entity.to_string(),
                message: format!("'{}' is not a valid field name", name),
                source: None,
            })
        }
    }
}
