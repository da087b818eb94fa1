//! ORM binding integration tests over in-memory SQLite.

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use serde_json::{Value, json};

use helios_bindings::orm::{ExtensionOutput, OrmBinding};
use helios_bindings::types::{
    Criteria, FindOptions, Found, Identifier, Model, Record, SortDirection,
};
use helios_bindings::{BackendKind, Binding, BindingCapability, ConnectionRegistry, ErrorKind};

use common::{ContendedFactory, CountingFactory, USER_SCHEMA, orm_settings};

fn fields(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

async fn users(registry: &ConnectionRegistry) -> OrmBinding<Record> {
    OrmBinding::with_factory(registry, orm_settings("User"), &CountingFactory::new(USER_SCHEMA))
        .await
        .expect("Failed to construct ORM binding")
}

async fn seed(binding: &OrmBinding<Record>) {
    for (name, status, age) in [
        ("Ann", "active", 31),
        ("Bob", "inactive", 45),
        ("Cid", "active", 27),
    ] {
        binding
            .create(fields(json!({"name": name, "status": status, "age": age})))
            .await
            .unwrap();
    }
}

// ============================================================================
// Construction
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_construction_initializes_once() {
    let registry = Arc::new(ConnectionRegistry::new());
    let factory = Arc::new(CountingFactory::new(USER_SCHEMA));

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let factory = Arc::clone(&factory);
            tokio::spawn(async move {
                let settings = orm_settings("User");
                OrmBinding::<Record>::with_factory(&registry, settings, factory.as_ref())
                    .await
                    .map(|binding| Arc::clone(binding.session()))
            })
        })
        .collect();

    let mut sessions = Vec::new();
    for task in tasks {
        sessions.push(task.await.unwrap().unwrap());
    }

    assert_eq!(factory.opened(), 1);
    assert_eq!(registry.initializations(), 1);
    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
}

#[tokio::test]
async fn test_missing_settings_fail_before_session_opens() {
    let registry = ConnectionRegistry::new();
    let factory = CountingFactory::new(USER_SCHEMA);

    for settings in [
        helios_bindings::Settings::new().with("path", ":memory:"),
        helios_bindings::Settings::new().with("class", "User"),
    ] {
        let err = OrmBinding::<Record>::with_factory(&registry, settings, &factory)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    assert_eq!(factory.opened(), 0);
    assert!(!registry.is_initialized(BackendKind::Orm));
}

#[tokio::test]
async fn test_invalid_entity_name() {
    let registry = ConnectionRegistry::new();
    let err = OrmBinding::<Record>::with_factory(
        &registry,
        orm_settings("User; DROP TABLE User"),
        &CountingFactory::new(USER_SCHEMA),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!registry.is_initialized(BackendKind::Orm));
}

#[tokio::test]
async fn test_failed_session_open_can_be_retried() {
    let registry = ConnectionRegistry::new();

    let failing = CountingFactory::failing();
    let err = OrmBinding::<Record>::with_factory(&registry, orm_settings("User"), &failing)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("database is on fire"));
    assert!(!registry.is_initialized(BackendKind::Orm));

    let binding = users(&registry).await;
    assert!(binding.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_consumed_settings_are_stripped() {
    let registry = ConnectionRegistry::new();
    let settings = orm_settings("User")
        .with("meta_cache", "memory")
        .with("query_cache", "array")
        .with("proxy_dir", "/tmp/proxies")
        .with("proxy_namespace", "Proxies")
        .with("label", "kept");

    let binding: OrmBinding<Record> =
        OrmBinding::with_factory(&registry, settings, &CountingFactory::new(USER_SCHEMA))
            .await
            .unwrap();

    let remaining = binding.settings();
    for key in ["meta_cache", "query_cache", "proxy_dir", "proxy_namespace"] {
        assert!(!remaining.contains(key), "{} should be stripped", key);
    }
    assert!(remaining.contains("label"));
    assert!(remaining.contains("class"));
}

#[tokio::test]
async fn test_bindings_share_one_session() {
    let registry = ConnectionRegistry::new();
    let first = users(&registry).await;
    let second = users(&registry).await;

    let created = first.create(fields(json!({"name": "Ann"}))).await.unwrap();
    let seen = second.read(&created.identifier().unwrap()).await.unwrap();

    assert_eq!(seen.get_str("name"), Some("Ann"));
    assert!(Arc::ptr_eq(first.session(), second.session()));
}

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn test_create_returns_reread_row() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;

    let input = fields(json!({"name": "Ann", "status": "active"}));
    let created = binding.create(input.clone()).await.unwrap();

    assert_eq!(created.identifier(), Some(Identifier::Numeric(1)));
    // Columns the payload left out come back from the table.
    assert_eq!(created.get("age"), Some(&Value::Null));

    let read = binding.read(&created.identifier().unwrap()).await.unwrap();
    assert_eq!(read, created);
    for (field, value) in &input {
        assert_eq!(read.get(field), Some(value), "field {}", field);
    }
}

#[tokio::test]
async fn test_create_rejected_by_schema() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;

    let err = binding.create(fields(json!({"status": "active"}))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CreateFailure);

    let err = binding.create(fields(json!({"name": "Ann", "nickname": "A"}))).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CreateFailure);

    assert!(binding.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_missing_and_non_numeric() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;

    let err = binding.read(&Identifier::from(404)).await.unwrap_err();
    assert!(err.is_not_found());

    let err = binding.read(&Identifier::from("abc")).await.unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn test_update_and_delete() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;

    let mut model = binding.create(fields(json!({"name": "Ann", "age": 30}))).await.unwrap();
    model.set("age", 31);

    let updated = binding.update(&model).await.unwrap();
    assert_eq!(updated.get("age"), Some(&json!(31)));
    assert_eq!(updated.get_str("name"), Some("Ann"));

    assert!(binding.delete(&updated).await.unwrap());
    let err = binding.read(&updated.identifier().unwrap()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_update_and_delete_missing_row() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;
    let ghost = Record::new(fields(json!({"id": 999, "name": "Ghost"})));

    let err = binding.update(&ghost).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(std::error::Error::source(&err).is_some());

    let err = binding.delete(&ghost).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = binding.update(&Record::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpdateFailure);

    let err = binding.delete(&Record::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeleteFailure);
}

#[tokio::test]
async fn test_write_discarded_by_another_flush() {
    let registry = ConnectionRegistry::new();
    let factory = ContendedFactory::new(USER_SCHEMA);
    let binding: OrmBinding<Record> =
        OrmBinding::with_factory(&registry, orm_settings("User"), &factory)
            .await
            .unwrap();

    factory.set_contended(false);
    let ann = binding.create(fields(json!({"name": "Ann"}))).await.unwrap();

    // Every flush now lets a rival caller's failing flush run first.
    factory.set_contended(true);
    let err = binding.delete(&ann).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeleteFailure);
    assert!(err.to_string().contains("discarded"));

    factory.set_contended(false);
    let read = binding.read(&ann.identifier().unwrap()).await.unwrap();
    assert_eq!(read.get_str("name"), Some("Ann"));
}

#[tokio::test]
async fn test_refresh_is_unsupported() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;
    let mut model = Record::default();

    let err = binding.refresh(&mut model).await.unwrap_err();
    assert!(err.is_unsupported());
    assert!(!binding.supports(BindingCapability::Refresh));
    assert!(binding.supports(BindingCapability::Paging));
}

// ============================================================================
// Find
// ============================================================================

#[tokio::test]
async fn test_find_without_criteria_returns_everything() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;
    seed(&binding).await;

    let found = binding
        .find(&Criteria::new(), &FindOptions::new().limit(1))
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
}

#[tokio::test]
async fn test_find_with_criteria_and_options() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;
    seed(&binding).await;

    let criteria = Criteria::new().with("status", "active");
    let found = binding.find(&criteria, &FindOptions::new()).await.unwrap();
    let names: Vec<_> = found
        .into_models()
        .iter()
        .map(|m| m.get_str("name").unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Ann", "Cid"]);

    let options = FindOptions::new().order_by("age", SortDirection::Asc).limit(1);
    let found = binding.find(&criteria, &options).await.unwrap();
    match found {
        Found::Models(models) => {
            assert_eq!(models.len(), 1);
            assert_eq!(models[0].get_str("name"), Some("Cid"));
        }
        other => panic!("expected models, got {:?}", other),
    }
}

#[tokio::test]
async fn test_find_rejects_unsafe_field_names() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;

    let criteria = Criteria::new().with("name\" OR 1=1 --", "x");
    let err = binding.find(&criteria, &FindOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailure);
}

// ============================================================================
// Extension operations
// ============================================================================

#[tokio::test]
async fn test_call_forwards_to_repository_and_session() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;
    seed(&binding).await;

    let active = Criteria::new().with("status", "active");
    match binding.call("count", &active).await.unwrap() {
        ExtensionOutput::Count(count) => assert_eq!(count, 2),
        other => panic!("expected a count, got {:?}", other),
    }

    match binding.call("findOneBy", &Criteria::new().with("name", "Bob")).await.unwrap() {
        ExtensionOutput::Model(Some(model)) => assert_eq!(model.get("age"), Some(&json!(45))),
        other => panic!("expected a model, got {:?}", other),
    }

    match binding.call("query_log", &Criteria::new()).await.unwrap() {
        ExtensionOutput::QueryLog(entries) => {
            assert!(entries.iter().any(|e| e.sql.starts_with("SELECT COUNT(*)")));
        }
        other => panic!("expected the query log, got {:?}", other),
    }
}

#[tokio::test]
async fn test_call_unknown_operation() {
    let registry = ConnectionRegistry::new();
    let binding = users(&registry).await;

    let err = binding.call("bogus", &Criteria::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownOperation);
    assert!(err.to_string().contains("bogus"));
}

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn test_typed_columns_from_metadata() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Account.json"),
        r#"{"table": "accounts", "columns": {"active": "boolean", "tags": "json"}}"#,
    )
    .unwrap();

    let registry = ConnectionRegistry::new();
    let factory = CountingFactory::new(
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT, active INTEGER, tags TEXT);",
    );
    let settings = orm_settings("Account")
        .with("metadata_dir", dir.path().to_string_lossy().to_string())
        .with("meta_cache", "memory");
    let binding: OrmBinding<Record> = OrmBinding::with_factory(&registry, settings, &factory)
        .await
        .unwrap();

    let created = binding
        .create(fields(json!({"name": "ops", "active": true, "tags": ["a", "b"]})))
        .await
        .unwrap();

    assert_eq!(created.get("active"), Some(&json!(true)));
    assert_eq!(created.get("tags"), Some(&json!(["a", "b"])));

    let found = binding
        .find(&Criteria::new().with("active", true), &FindOptions::new())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_entity_without_metadata_file() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ConnectionRegistry::new();
    let settings = orm_settings("Missing")
        .with("metadata_dir", dir.path().to_string_lossy().to_string());

    let binding: OrmBinding<Record> =
        OrmBinding::with_factory(&registry, settings, &CountingFactory::new(USER_SCHEMA))
            .await
            .unwrap();

    let err = binding.find_all().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryFailure);
}
