//! Per-entity query repository.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{BindingError, BindingResult};
use crate::mapping::populate_new;
use crate::types::{Criteria, FindOptions, Model};

use super::query::{CriteriaTranslator, EntityQuery};
use super::session::OrmSession;

/// Read-only queries against one entity of a session.
pub struct Repository<M> {
    entity: String,
    session: Arc<dyn OrmSession>,
    translator: Arc<CriteriaTranslator>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity.clone(),
            session: Arc::clone(&self.session),
            translator: Arc::clone(&self.translator),
            _model: PhantomData,
        }
    }
}

impl<M: Model> Repository<M> {
    pub(crate) fn new(
        entity: String,
        session: Arc<dyn OrmSession>,
        translator: Arc<CriteriaTranslator>,
    ) -> Self {
        Self {
            entity,
            session,
            translator,
            _model: PhantomData,
        }
    }

    /// Entity this repository queries.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Looks up one record by primary key.
    pub async fn find(&self, identifier: i64) -> BindingResult<Option<M>> {
        let row = self
            .session
            .find(&self.entity, identifier)
            .await
            .map_err(|e| BindingError::query_failure(&self.entity, e))?;
        Ok(row.map(populate_new))
    }

    /// Returns every record.
    pub async fn find_all(&self) -> BindingResult<Vec<M>> {
        let rows = self
            .session
            .find_all(&self.entity)
            .await
            .map_err(|e| BindingError::query_failure(&self.entity, e))?;
        Ok(rows.into_iter().map(populate_new).collect())
    }

    /// Returns the records matching `criteria`, ordered and paged by `options`.
    pub async fn find_by(
        &self,
        criteria: &Criteria,
        options: &FindOptions,
    ) -> BindingResult<Vec<M>> {
        let query = self.translator.translate(&self.entity, criteria, options)?;
        self.run(&query).await
    }

    /// Returns the first record matching `criteria`.
    pub async fn find_one_by(&self, criteria: &Criteria) -> BindingResult<Option<M>> {
        let query = self
            .translator
            .translate(&self.entity, criteria, &FindOptions::new().limit(1))?;
        Ok(self.run(&query).await?.into_iter().next())
    }

    /// Counts the records matching `criteria`.
    pub async fn count(&self, criteria: &Criteria) -> BindingResult<u64> {
        let query = self
            .translator
            .translate(&self.entity, criteria, &FindOptions::new())?;
        self.session
            .count(&query)
            .await
            .map_err(|e| BindingError::query_failure(&self.entity, e))
    }

    async fn run(&self, query: &EntityQuery) -> BindingResult<Vec<M>> {
        let rows = self
            .session
            .find_by(query)
            .await
            .map_err(|e| BindingError::query_failure(&self.entity, e))?;
        Ok(rows.into_iter().map(populate_new).collect())
    }
}

impl<M> std::fmt::Debug for Repository<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}
