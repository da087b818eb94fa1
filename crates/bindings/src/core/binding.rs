//! The uniform CRUD contract.

use std::fmt;

use async_trait::async_trait;

use crate::error::BindingResult;
use crate::types::{Criteria, FieldMap, FindOptions, Found, Identifier, Model};

use super::{BackendKind, BindingCapability};

/// Uniform CRUD access to one entity or resource of one backend.
///
/// The entity (or resource path) is fixed when the binding is constructed.
/// A strategy that has no sane mapping for a verb returns
/// [`BindingError::UnsupportedOperation`](crate::error::BindingError::UnsupportedOperation);
/// callers should treat that as a fact about the backend and not retry.
///
/// # Example
///
/// ```ignore
/// use helios_bindings::core::Binding;
/// use helios_bindings::types::{Criteria, FindOptions, Record};
///
/// async fn active_users(binding: &dyn Binding<Record>) -> BindingResult<Vec<Record>> {
///     let criteria = Criteria::new().with("status", "active");
///     Ok(binding.find(&criteria, &FindOptions::new()).await?.into_models())
/// }
/// ```
#[async_trait]
pub trait Binding<M: Model>: Send + Sync + fmt::Debug {
    /// Returns the kind of backend behind this binding.
    fn kind(&self) -> BackendKind;

    /// Returns `true` if this binding implements `capability`.
    fn supports(&self, capability: BindingCapability) -> bool;

    /// Finds records matching `criteria`.
    ///
    /// Empty criteria return the full collection. Options apply only where
    /// the backend supports paging.
    async fn find(&self, criteria: &Criteria, options: &FindOptions) -> BindingResult<Found<M>>;

    /// Creates a record and returns it as re-read from the backend.
    ///
    /// # Errors
    ///
    /// * `CreateFailure` - the backend rejected the payload
    async fn create(&self, fields: FieldMap) -> BindingResult<M>;

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// * `NotFound` - nothing has this identifier
    /// * `UnsupportedOperation` - this binding cannot look up this identifier form
    async fn read(&self, identifier: &Identifier) -> BindingResult<M>;

    /// Re-reads backend state into `model`.
    async fn refresh(&self, model: &mut M) -> BindingResult<bool>;

    /// Persists `model` and returns the refreshed record.
    ///
    /// # Errors
    ///
    /// * `UpdateFailure` - the backend rejected the change
    async fn update(&self, model: &M) -> BindingResult<M>;

    /// Removes the record identified by `model`.
    ///
    /// # Errors
    ///
    /// * `NotFound` - the record is already gone
    /// * `DeleteFailure` - the backend rejected the delete
    async fn delete(&self, model: &M) -> BindingResult<bool>;
}
