//! Error types for the binding layer.
//!
//! Every backend call is wrapped at the point it is made, and whatever the
//! backend raised is attached as the `source` of one [`BindingError`]. Callers
//! branch on [`BindingError::kind`] and never see a backend-native error type.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::core::BackendKind;

/// A boxed backend error carried as the cause of a [`BindingError`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// The single error type surfaced by every binding operation.
#[derive(Error, Debug)]
pub enum BindingError {
    /// Construction settings are missing or invalid.
    ///
    /// `backend` is `None` when the settings could not be attributed to a
    /// backend, such as an unreadable settings file.
    #[error("invalid {} configuration: {message}", backend_label(.backend))]
    Configuration {
        backend: Option<BackendKind>,
        message: String,
    },

    /// The identifier or criteria matched nothing.
    #[error("{target} not found: {identifier}")]
    NotFound {
        target: String,
        identifier: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// A find or read reached the backend and the backend failed.
    #[error("query against {target} failed: {message}")]
    QueryFailure {
        target: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// The backend rejected a create.
    #[error("cannot create {target}: {message}")]
    CreateFailure {
        target: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// The backend rejected an update.
    #[error("cannot update {target}: {message}")]
    UpdateFailure {
        target: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// The backend rejected a delete.
    #[error("cannot delete {target}: {message}")]
    DeleteFailure {
        target: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// The binding does not implement this verb for its backend.
    #[error("{backend} binding does not support {operation}")]
    UnsupportedOperation {
        backend: BackendKind,
        operation: String,
    },

    /// No session or repository operation matched the requested name.
    #[error("unknown operation {backend}::{operation}")]
    UnknownOperation {
        backend: BackendKind,
        operation: String,
    },
}

fn backend_label(backend: &Option<BackendKind>) -> String {
    backend.map_or_else(|| "binding".to_string(), |b| b.to_string())
}

/// Flat classification of a [`BindingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    QueryFailure,
    CreateFailure,
    UpdateFailure,
    DeleteFailure,
    UnsupportedOperation,
    UnknownOperation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::NotFound => "not-found",
            ErrorKind::QueryFailure => "query-failure",
            ErrorKind::CreateFailure => "create-failure",
            ErrorKind::UpdateFailure => "update-failure",
            ErrorKind::DeleteFailure => "delete-failure",
            ErrorKind::UnsupportedOperation => "unsupported-operation",
            ErrorKind::UnknownOperation => "unknown-operation",
        };
        write!(f, "{}", name)
    }
}

impl BindingError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BindingError::Configuration { .. } => ErrorKind::Configuration,
            BindingError::NotFound { .. } => ErrorKind::NotFound,
            BindingError::QueryFailure { .. } => ErrorKind::QueryFailure,
            BindingError::CreateFailure { .. } => ErrorKind::CreateFailure,
            BindingError::UpdateFailure { .. } => ErrorKind::UpdateFailure,
            BindingError::DeleteFailure { .. } => ErrorKind::DeleteFailure,
            BindingError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            BindingError::UnknownOperation { .. } => ErrorKind::UnknownOperation,
        }
    }

    /// Returns `true` for [`ErrorKind::UnsupportedOperation`].
    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::UnsupportedOperation
    }

    /// Returns `true` for [`ErrorKind::NotFound`].
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn configuration(backend: BackendKind, message: impl Into<String>) -> Self {
        BindingError::Configuration {
            backend: Some(backend),
            message: message.into(),
        }
    }

    /// A configuration error not tied to one backend.
    pub(crate) fn invalid_settings(message: impl Into<String>) -> Self {
        BindingError::Configuration {
            backend: None,
            message: message.into(),
        }
    }

    pub(crate) fn missing_setting(backend: BackendKind, key: &str) -> Self {
        Self::configuration(backend, format!("missing required setting '{}'", key))
    }

    pub(crate) fn unsupported(backend: BackendKind, operation: &str) -> Self {
        BindingError::UnsupportedOperation {
            backend,
            operation: operation.to_string(),
        }
    }

    pub(crate) fn not_found(target: impl Into<String>, identifier: impl fmt::Display) -> Self {
        BindingError::NotFound {
            target: target.into(),
            identifier: identifier.to_string(),
            source: None,
        }
    }

    pub(crate) fn query_failure(
        target: impl Into<String>,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BindingError::QueryFailure {
            target: target.into(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Attaches `cause` to an error that carries a source slot.
    ///
    /// Variants without a source slot are returned unchanged.
    pub(crate) fn with_cause(mut self, cause: impl Into<BoxedCause>) -> Self {
        match &mut self {
            BindingError::NotFound { source, .. }
            | BindingError::QueryFailure { source, .. }
            | BindingError::CreateFailure { source, .. }
            | BindingError::UpdateFailure { source, .. }
            | BindingError::DeleteFailure { source, .. } => *source = Some(cause.into()),
            BindingError::Configuration { .. }
            | BindingError::UnsupportedOperation { .. }
            | BindingError::UnknownOperation { .. } => {}
        }
        self
    }
}

/// Result type alias for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;
