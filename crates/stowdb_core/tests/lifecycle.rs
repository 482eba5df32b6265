//! Open, upgrade and version-change behaviour against the in-memory backend.

use std::rc::Rc;
use stowdb_codec::record;
use stowdb_core::schema::{date, number, string, ColumnType, ColumnWarning, SchemaBuilder};
use stowdb_core::{Config, Database, DatabaseState, EngineError, EngineEvent};
use stowdb_storage::{Fault, MemoryBackend, StorageError};
use stowdb_testkit::{todo, todo_schema, TestEngine, TEST_DB, TODOS};

fn open(backend: &MemoryBackend, version: u32) -> Database {
    Database::new(
        Rc::new(backend.clone()),
        Config::new(TEST_DB).version(version),
    )
}

#[tokio::test(flavor = "current_thread")]
async fn store_without_primary_key_fails_and_creates_nothing() {
    let backend = MemoryBackend::new();
    let schema = todo_schema().store("tags", [("label", string())]);

    let db = open(&backend, 1);
    let result = db.open(schema).await;

    assert!(matches!(result, Err(EngineError::InvalidSchema { .. })));
    assert_eq!(db.state(), DatabaseState::Errored);
    assert!(backend.store_names(TEST_DB).is_empty());
    assert_eq!(backend.version(TEST_DB), None);
}

#[tokio::test(flavor = "current_thread")]
async fn store_with_two_primary_keys_fails_and_creates_nothing() {
    let backend = MemoryBackend::new();
    let schema = SchemaBuilder::new().store(
        "pairs",
        [("left", string().primary_key()), ("right", string().primary_key())],
    );

    let result = open(&backend, 1).open(schema).await;

    match result {
        Err(EngineError::InvalidSchema { message }) => {
            assert!(message.contains("more than one primary key"));
        }
        other => panic!("expected InvalidSchema, got {other:?}"),
    }
    assert!(backend.store_names(TEST_DB).is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn readiness_is_single_assignment() {
    let backend = MemoryBackend::new();
    let db = open(&backend, 1);
    let bad = SchemaBuilder::new().store("s", [("x", string())]);

    let first = db.open(bad).await;
    let second = db.open(todo_schema()).await;
    let waited = db.ready().await;

    assert!(first.is_err());
    assert_eq!(first, second);
    assert_eq!(first, waited);
    assert!(backend.store_names(TEST_DB).is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn reopening_existing_store_only_warns() {
    let backend = MemoryBackend::new();
    TestEngine::open(backend.clone(), 1, todo_schema()).await;

    let engine = TestEngine::open(backend.clone(), 2, todo_schema()).await;

    assert_eq!(engine.state(), DatabaseState::Ready);
    assert_eq!(backend.store_names(TEST_DB), vec![TODOS.to_string()]);
    assert_eq!(backend.version(TEST_DB), Some(2));
    assert_eq!(
        engine.events().warnings(),
        vec![EngineEvent::StoreSkipped {
            store: TODOS.to_string()
        }]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn version_bump_adds_new_stores_and_keeps_data() {
    let backend = MemoryBackend::new();
    let v1 = TestEngine::open(backend.clone(), 1, todo_schema()).await;
    v1.table().insert(todo("keep me", false, 1)).await.unwrap();
    drop(v1);

    let grown = todo_schema().store(
        "tags",
        [
            ("name", string().primary_key()),
            ("slug", string().unique()),
        ],
    );
    let v2 = TestEngine::open(backend.clone(), 2, grown).await;

    assert_eq!(
        backend.store_names(TEST_DB),
        vec!["tags".to_string(), TODOS.to_string()]
    );
    assert_eq!(backend.index_names(TEST_DB, "tags"), vec!["slug_idx"]);
    assert_eq!(v2.stored(TODOS).len(), 1);
    assert!(v2.events().history().contains(&EngineEvent::Upgraded {
        old_version: 1,
        new_version: 2,
    }));
}

#[tokio::test(flavor = "current_thread")]
async fn existing_store_is_skipped_with_its_indexes() {
    let backend = MemoryBackend::new();
    let schema = || {
        SchemaBuilder::new().store(
            "users",
            [
                ("id", number().primary_key()),
                ("email", string().unique()),
            ],
        )
    };
    TestEngine::open(backend.clone(), 1, schema()).await;
    let engine = TestEngine::open(backend.clone(), 2, schema()).await;

    assert_eq!(
        engine.events().warnings(),
        vec![EngineEvent::StoreSkipped {
            store: "users".to_string()
        }]
    );
    assert_eq!(backend.index_names(TEST_DB, "users"), vec!["email_idx"]);
}

#[tokio::test(flavor = "current_thread")]
async fn unique_added_to_existing_store_leaves_data_alone() {
    let backend = MemoryBackend::new();
    let v1 = TestEngine::open(
        backend.clone(),
        1,
        SchemaBuilder::new().store(
            "users",
            [
                ("id", number().primary_key().auto_increment().unwrap()),
                ("email", string()),
            ],
        ),
    )
    .await;
    let users = v1.db.store("users").unwrap();
    users.insert(record! { "email" => "a@x" }).await.unwrap();
    users.insert(record! { "email" => "a@x" }).await.unwrap();
    drop(v1);

    let v2 = TestEngine::open(
        backend.clone(),
        2,
        SchemaBuilder::new().store(
            "users",
            [
                ("id", number().primary_key().auto_increment().unwrap()),
                ("email", string().unique()),
            ],
        ),
    )
    .await;

    assert_eq!(v2.db.state(), DatabaseState::Ready);
    assert_eq!(
        v2.events().warnings(),
        vec![EngineEvent::StoreSkipped {
            store: "users".to_string()
        }]
    );
    assert!(backend.index_names(TEST_DB, "users").is_empty());
    assert_eq!(v2.stored("users").len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn builder_warnings_become_events() {
    let backend = MemoryBackend::new();
    let schema = SchemaBuilder::new().store(
        "events",
        [("at", date().primary_key().unique())],
    );
    let engine = TestEngine::open(backend, 1, schema).await;

    let warnings: Vec<ColumnWarning> = engine
        .events()
        .history()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::SchemaWarning(warning) => Some(warning.warning),
            _ => None,
        })
        .collect();
    assert_eq!(
        warnings,
        vec![
            ColumnWarning::NonScalarPrimaryKey(ColumnType::Date),
            ColumnWarning::RedundantUnique,
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn lower_version_is_a_storage_error() {
    let backend = MemoryBackend::new();
    TestEngine::open(backend.clone(), 3, todo_schema()).await;

    let result = open(&backend, 2).open(todo_schema()).await;
    assert_eq!(
        result,
        Err(EngineError::Storage(StorageError::Version {
            requested: 2,
            stored: 3
        }))
    );
}

#[tokio::test(flavor = "current_thread")]
async fn injected_open_failure_errors_the_handle() {
    let backend = MemoryBackend::new();
    backend.inject(Fault::FailOpen {
        error: StorageError::Backend("storage unavailable".to_string()),
    });

    let db = open(&backend, 1);
    assert!(db.open(todo_schema()).await.is_err());
    assert_eq!(db.state(), DatabaseState::Errored);
    assert_eq!(
        db.store(TODOS).unwrap().get_all().await,
        Err(EngineError::NotOpen)
    );
}

#[tokio::test(flavor = "current_thread")]
async fn operations_before_open_fail_fast() {
    let db = open(&MemoryBackend::new(), 1);
    assert_eq!(db.state(), DatabaseState::Unopened);
    assert_eq!(db.store(TODOS).err(), Some(EngineError::NotOpen));
}

#[tokio::test(flavor = "current_thread")]
async fn newer_version_elsewhere_requires_reload() {
    let backend = MemoryBackend::new();
    let old = TestEngine::open(backend.clone(), 1, todo_schema()).await;
    let table = old.table();
    table.insert(todo("before", false, 1)).await.unwrap();

    let new = TestEngine::open(backend.clone(), 2, todo_schema()).await;

    assert_eq!(old.state(), DatabaseState::ReloadRequired);
    assert!(old.events().history().contains(&EngineEvent::ReloadRequired {
        old_version: 1,
        new_version: Some(2),
    }));
    assert_eq!(
        table.insert(todo("after", false, 2)).await,
        Err(EngineError::NotOpen)
    );
    assert_eq!(backend.open_connection_count(TEST_DB), 1);

    // The newer handle is unaffected.
    new.table()
        .insert(record! {
            "title" => "new",
            "content" => "",
            "completed" => true,
            "createdAt" => stowdb_codec::Value::Date(3),
        })
        .await
        .unwrap();
    assert_eq!(new.stored(TODOS).len(), 2);
}
