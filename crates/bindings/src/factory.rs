//! Opening a binding from settings alone.

use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::core::{BackendKind, Binding};
use crate::error::{BindingError, BindingResult};
use crate::registry::ConnectionRegistry;
use crate::types::Record;

/// Setting that selects the binding strategy.
pub const BINDING_KEY: &str = "binding";

/// Opens the binding selected by the `binding` setting.
///
/// | `binding` | Strategy |
/// |-----------|----------|
/// | `orm` | [`OrmBinding`](crate::orm::OrmBinding) |
/// | `directory` | [`DirectoryApiBinding`](crate::directory::DirectoryApiBinding) |
/// | `rest` | [`RestBinding`](crate::rest::RestBinding) |
///
/// The `binding` key is removed before the rest of `settings` reaches the
/// strategy.
///
/// # Errors
///
/// Returns a configuration error if `binding` is missing or unknown, if the
/// selected strategy was compiled out, or if the strategy rejects its
/// settings.
pub async fn open_binding(
    registry: &ConnectionRegistry,
    mut settings: Settings,
) -> BindingResult<Box<dyn Binding<Record>>> {
    let kind = match settings.take(BINDING_KEY) {
        Some(Value::String(name)) => BackendKind::from_setting(&name).ok_or_else(|| {
            BindingError::invalid_settings(format!(
                "unknown binding '{}'; expected orm, directory or rest",
                name
            ))
        })?,
        Some(other) => {
            return Err(BindingError::invalid_settings(format!(
                "setting '{}' must be a string, got {}",
                BINDING_KEY, other
            )));
        }
        None => {
            return Err(BindingError::invalid_settings(format!(
                "missing required setting '{}'",
                BINDING_KEY
            )));
        }
    };
    debug!(backend = %kind, "Opening binding");

    match kind {
        BackendKind::Orm => open_orm(registry, settings).await,
        BackendKind::DirectoryApi => open_directory(settings),
        BackendKind::Rest => open_rest(settings),
    }
}

#[cfg(feature = "sqlite")]
async fn open_orm(
    registry: &ConnectionRegistry,
    settings: Settings,
) -> BindingResult<Box<dyn Binding<Record>>> {
    let binding = crate::orm::OrmBinding::<Record>::new(registry, settings).await?;
    Ok(Box::new(binding))
}

#[cfg(not(feature = "sqlite"))]
async fn open_orm(
    _registry: &ConnectionRegistry,
    _settings: Settings,
) -> BindingResult<Box<dyn Binding<Record>>> {
    Err(compiled_out(BackendKind::Orm, "sqlite"))
}

#[cfg(feature = "directory")]
fn open_directory(settings: Settings) -> BindingResult<Box<dyn Binding<Record>>> {
    let binding = crate::directory::DirectoryApiBinding::<Record>::new(settings)?;
    Ok(Box::new(binding))
}

#[cfg(not(feature = "directory"))]
fn open_directory(_settings: Settings) -> BindingResult<Box<dyn Binding<Record>>> {
    Err(compiled_out(BackendKind::DirectoryApi, "directory"))
}

#[cfg(feature = "rest")]
fn open_rest(settings: Settings) -> BindingResult<Box<dyn Binding<Record>>> {
    let binding = crate::rest::RestBinding::<Record>::new(settings)?;
    Ok(Box::new(binding))
}

#[cfg(not(feature = "rest"))]
fn open_rest(_settings: Settings) -> BindingResult<Box<dyn Binding<Record>>> {
    Err(compiled_out(BackendKind::Rest, "rest"))
}

#[allow(dead_code)]
fn compiled_out(backend: BackendKind, feature: &str) -> BindingError {
    BindingError::configuration(
        backend,
        format!("built without the '{}' feature", feature),
    )
}
