//! The result of a `find`.

use serde_json::Value;

/// What a binding's `find` produced.
///
/// Strategies disagree on what "no results" looks like, and the difference
/// is kept visible here rather than flattened into an empty vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Found<M> {
    /// Records mapped into models.
    Models(Vec<M>),
    /// A non-collection payload passed through unmapped.
    Raw(Value),
    /// The backend returned no collection at all.
    ///
    /// The directory binding reports an empty user list this way. It cannot
    /// distinguish an empty directory from one it could not enumerate.
    Nothing,
}

impl<M> Found<M> {
    /// Returns the mapped models, or an empty vector for the other variants.
    pub fn into_models(self) -> Vec<M> {
        match self {
            Found::Models(models) => models,
            Found::Raw(_) | Found::Nothing => Vec::new(),
        }
    }

    /// Borrows the mapped models, if any.
    pub fn models(&self) -> Option<&[M]> {
        match self {
            Found::Models(models) => Some(models),
            Found::Raw(_) | Found::Nothing => None,
        }
    }

    /// Returns `true` for [`Found::Nothing`].
    pub fn is_nothing(&self) -> bool {
        matches!(self, Found::Nothing)
    }

    /// Number of mapped models.
    pub fn len(&self) -> usize {
        self.models().map_or(0, <[M]>::len)
    }

    /// Returns `true` if no model was mapped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
