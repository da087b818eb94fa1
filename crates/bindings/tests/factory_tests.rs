//! Opening bindings from settings through `open_binding`.

use serde_json::json;

use helios_bindings::types::{Criteria, FindOptions};
use helios_bindings::{
    BackendKind, Binding, BindingCapability, ConnectionRegistry, ErrorKind, Settings, open_binding,
};

#[tokio::test]
async fn test_missing_or_unknown_binding() {
    let registry = ConnectionRegistry::new();

    for settings in [
        Settings::new().with("url", "https://api.example.org"),
        Settings::new().with("binding", "ldap"),
        Settings::new().with("binding", 3),
    ] {
        let err = open_binding(&registry, settings).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().starts_with("invalid binding configuration"));
    }
}

#[cfg(feature = "rest")]
#[tokio::test]
async fn test_open_rest_binding() {
    let registry = ConnectionRegistry::new();
    let settings = Settings::new()
        .with("binding", "REST")
        .with("url", "http://127.0.0.1:9/api");

    let binding = open_binding(&registry, settings).await.unwrap();
    assert_eq!(binding.kind(), BackendKind::Rest);
    assert!(!binding.supports(BindingCapability::Update));
    assert!(!registry.is_initialized(BackendKind::Rest));
    assert!(format!("{:?}", binding).starts_with("RestBinding"));
}

#[cfg(feature = "directory")]
#[tokio::test]
async fn test_open_directory_binding() {
    let registry = ConnectionRegistry::new();
    let settings = Settings::new()
        .with("binding", "directory")
        .with("username", "admin@example.org")
        .with("password", "secret");

    let binding = open_binding(&registry, settings).await.unwrap();
    assert_eq!(binding.kind(), BackendKind::DirectoryApi);

    let missing = Settings::new()
        .with("binding", "directory")
        .with("username", "admin@example.org");
    let err = open_binding(&registry, missing).await.unwrap_err();
    assert!(err.to_string().contains("directory-api"));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_open_orm_binding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");
    let registry = ConnectionRegistry::new();

    let settings = Settings::from_json(
        &json!({
            "binding": "orm",
            "class": "Note",
            "path": path.to_string_lossy(),
        })
        .to_string(),
    )
    .unwrap();

    let binding = open_binding(&registry, settings).await.unwrap();
    assert_eq!(binding.kind(), BackendKind::Orm);
    assert!(registry.is_initialized(BackendKind::Orm));

    // The database file exists but has no table for the entity yet.
    let err = binding
        .find(&Criteria::new(), &FindOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailure);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_global_registry_is_shared() {
    assert!(std::ptr::eq(ConnectionRegistry::global(), ConnectionRegistry::global()));

    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::new()
        .with("binding", "orm")
        .with("class", "Note")
        .with("path", dir.path().join("global.db").to_string_lossy().to_string());

    let binding = open_binding(ConnectionRegistry::global(), settings).await.unwrap();
    assert!(ConnectionRegistry::global().is_initialized(BackendKind::Orm));
    assert!(binding.supports(BindingCapability::Criteria));
}
