//! Shared connection handles, one per backend kind.
//!
//! The first binding of a kind to be constructed creates the handle; every
//! later construction reuses it. Concurrent first constructions race on a
//! per-kind [`tokio::sync::OnceCell`], so exactly one initializer runs and the
//! rest await its result.
//!
//! ```
//! use helios_bindings::core::BackendKind;
//! use helios_bindings::registry::ConnectionRegistry;
//!
//! # tokio_test_block_on(async {
//! let registry = ConnectionRegistry::new();
//! let first = registry
//!     .get_or_try_init(BackendKind::Orm, || async { Ok(String::from("session")) })
//!     .await
//!     .unwrap();
//! let second = registry
//!     .get_or_try_init(BackendKind::Orm, || async { Ok(String::from("another")) })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(*second, "session");
//! assert!(std::sync::Arc::ptr_eq(&first, &second));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::core::BackendKind;
use crate::error::{BindingError, BindingResult};

type Handle = Arc<dyn Any + Send + Sync>;

static GLOBAL: LazyLock<ConnectionRegistry> = LazyLock::new(ConnectionRegistry::new);

/// Owner of the shared connection handle for each backend kind.
#[derive(Default)]
pub struct ConnectionRegistry {
    slots: Mutex<HashMap<BackendKind, Arc<OnceCell<Handle>>>>,
    initializations: AtomicUsize,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    pub fn global() -> &'static ConnectionRegistry {
        &GLOBAL
    }

    /// Returns the handle for `kind`, running `init` if there is none yet.
    ///
    /// A failed `init` leaves the slot empty, so a later call may retry.
    ///
    /// # Errors
    ///
    /// Propagates the initializer's error. Returns a configuration error if
    /// the slot already holds a handle of another type.
    pub async fn get_or_try_init<T, F, Fut>(
        &self,
        kind: BackendKind,
        init: F,
    ) -> BindingResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = BindingResult<T>>,
    {
        // The map lock is released before awaiting; only the cell is shared.
        let cell = self.slot(kind);

        let handle = cell
            .get_or_try_init(|| async {
                let value = init().await?;
                let count = self.initializations.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    backend = %kind,
                    initializations = count,
                    "Initialized shared connection handle"
                );
                Ok::<Handle, BindingError>(Arc::new(value))
            })
            .await?;

        Arc::clone(handle).downcast::<T>().map_err(|_| {
            BindingError::configuration(
                kind,
                format!("shared handle is not a {}", type_name::<T>()),
            )
        })
    }

    /// Returns the handle for `kind` if it has been initialized.
    pub fn get<T: Send + Sync + 'static>(&self, kind: BackendKind) -> Option<Arc<T>> {
        let cell = self.slots.lock().get(&kind).cloned()?;
        cell.get().and_then(|handle| Arc::clone(handle).downcast::<T>().ok())
    }

    /// Returns `true` if the handle for `kind` has been initialized.
    pub fn is_initialized(&self, kind: BackendKind) -> bool {
        self.slots
            .lock()
            .get(&kind)
            .is_some_and(|cell| cell.initialized())
    }

    /// Number of initializers that have completed successfully.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    fn slot(&self, kind: BackendKind) -> Arc<OnceCell<Handle>> {
        let mut slots = self.slots.lock();
        let cell = slots.entry(kind).or_insert_with(|| {
            debug!(backend = %kind, "Creating registry slot");
            Arc::new(OnceCell::new())
        });
        Arc::clone(cell)
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock();
        let mut initialized: Vec<String> = slots
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(kind, _)| kind.to_string())
            .collect();
        initialized.sort();
        f.debug_struct("ConnectionRegistry")
            .field("initialized", &initialized)
            .field("initializations", &self.initializations())
            .finish()
    }
}
