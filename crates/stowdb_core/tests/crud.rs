//! CRUD and query behaviour over the todo schema.

use stowdb_codec::{record, Value};
use stowdb_core::query::{Direction, Operators, Predicate, Query};
use stowdb_core::schema::{number, string, SchemaBuilder};
use stowdb_core::{EngineError, Update};
use stowdb_storage::{Fault, MemoryBackend, StorageError};
use stowdb_testkit::{scenarios, todo, TestEngine, CLOCK_START, TODOS};

fn ids(records: &[Value]) -> Vec<i64> {
    records
        .iter()
        .filter_map(|record| record.get("id").and_then(Value::as_integer))
        .collect()
}

#[tokio::test(flavor = "current_thread")]
async fn insert_round_trip() {
    let engine = TestEngine::todos().await;
    let table = engine.table();
    let row = record! {
        "title" => "a",
        "content" => "b",
        "completed" => false,
        "createdAt" => Value::Date(CLOCK_START),
        "updatedAt" => Value::Null,
    };

    let key = table.insert(row.clone()).await.unwrap();
    let all = table.get_all().await.unwrap();

    assert_eq!(all.len(), 1);
    let stored = all[0].as_map().unwrap();
    assert_eq!(stored.get("id"), Some(&key));
    assert_eq!(key, Value::Integer(1));
    for (field, value) in &row {
        assert_eq!(stored.get(field), Some(value), "field {field}");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn caller_supplied_key_is_returned() {
    let schema = SchemaBuilder::new().store(
        "users",
        [("email", string().primary_key()), ("age", number().nullable())],
    );
    let engine = TestEngine::open(MemoryBackend::new(), 1, schema).await;
    let users = engine.db.store("users").unwrap();

    let key = users.insert(record! { "email" => "a@b.c" }).await.unwrap();
    assert_eq!(key, Value::from("a@b.c"));

    let duplicate = users.insert(record! { "email" => "a@b.c" }).await;
    assert!(matches!(
        duplicate,
        Err(EngineError::Storage(StorageError::Constraint(_)))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn returned_records_are_snapshots() {
    let engine = scenarios::seeded_todos(1).await;
    let table = engine.table();

    let mut first = table.get_all().await.unwrap();
    if let Some(map) = first[0].as_map_mut() {
        map.insert("title".to_string(), Value::from("changed"));
    }

    let again = table.get_all().await.unwrap();
    assert_eq!(again[0].get("title"), Some(&Value::from("todo 1")));
}

#[tokio::test(flavor = "current_thread")]
async fn filter_keeps_matching_records_in_natural_order() {
    let engine = scenarios::seeded_todos(5).await;

    let done = engine
        .table()
        .select(&Query::new().eq("completed", true))
        .await
        .unwrap();

    assert_eq!(ids(&done), vec![1, 3, 5]);
    assert!(done
        .iter()
        .all(|todo| todo.get("completed") == Some(&Value::Bool(true))));
}

#[tokio::test(flavor = "current_thread")]
async fn order_by_created_at_descending() {
    let engine = TestEngine::todos().await;
    let table = engine.table();
    for (title, at) in [("t2", 2), ("t1", 1), ("t3", 3)] {
        table.insert(todo(title, false, at)).await.unwrap();
    }

    let ordered = table
        .select(&Query::new().order_by("createdAt", Direction::Desc))
        .await
        .unwrap();
    let titles: Vec<&str> = ordered
        .iter()
        .filter_map(|todo| todo.get("title").and_then(Value::as_text))
        .collect();
    assert_eq!(titles, vec!["t3", "t2", "t1"]);
}

#[tokio::test(flavor = "current_thread")]
async fn limit_applies_after_filter_and_sort() {
    let engine = scenarios::seeded_todos(5).await;
    let table = engine.table();

    let two = table.select(&Query::new().limit(2)).await.unwrap();
    assert_eq!(ids(&two), vec![1, 2]);

    let latest_done = table
        .select(
            &Query::new()
                .eq("completed", true)
                .order_by("createdAt", Direction::Desc)
                .limit(2),
        )
        .await
        .unwrap();
    assert_eq!(ids(&latest_done), vec![5, 3]);
}

#[tokio::test(flavor = "current_thread")]
async fn update_merges_and_never_rewrites_the_key() {
    let engine = scenarios::seeded_todos(3).await;
    let table = engine.table();
    let before = table.get_all().await.unwrap();
    engine.clock.advance(60_000);

    let changed = table
        .update(&Update::set(record! { "completed" => true, "id" => 99 }).eq("id", 2))
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let after = table.get_all().await.unwrap();
    assert_eq!(ids(&after), vec![1, 2, 3]);
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);

    let mut expected = before[1].as_map().unwrap().clone();
    expected.insert("completed".to_string(), Value::Bool(true));
    expected.insert(
        "updatedAt".to_string(),
        Value::Date(CLOCK_START + 60_000),
    );
    assert_eq!(after[1], Value::Map(expected));
}

#[tokio::test(flavor = "current_thread")]
async fn update_with_operator_conditions() {
    let engine = scenarios::seeded_todos(5).await;
    let table = engine.table();

    let changed = table
        .update(
            &Update::set(record! { "title" => "late" })
                .when("createdAt", Operators::new().greater_than(Value::Date(CLOCK_START + 3))),
        )
        .await
        .unwrap();
    assert_eq!(changed, 2);

    let late = table
        .select(&Query::new().eq("title", "late"))
        .await
        .unwrap();
    assert_eq!(ids(&late), vec![4, 5]);
}

#[tokio::test(flavor = "current_thread")]
async fn delete_removes_matches_only() {
    let engine = scenarios::seeded_todos(4).await;
    let table = engine.table();

    let removed = table
        .delete(&Predicate::new().eq("completed", false))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(ids(&engine.stored(TODOS)), vec![1, 3]);

    let none = table
        .delete(&Predicate::new().eq("title", "missing"))
        .await
        .unwrap();
    assert_eq!(none, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn relational_condition_on_null_does_not_match() {
    let engine = scenarios::seeded_todos(2).await;
    let table = engine.table();
    table
        .update(&Update::set(record! { "updatedAt" => Value::Date(5) }).eq("id", 1))
        .await
        .unwrap();

    for operators in [
        Operators::new().greater_than(Value::Date(0)),
        Operators::new().greater_than_or_equal(Value::Date(0)),
        Operators::new().less_than(Value::Date(10)),
        Operators::new().less_than_or_equal(Value::Date(10)),
        Operators::new().is_between(Value::Date(0), Value::Date(10)),
    ] {
        let matched = table
            .select(&Query::new().when("updatedAt", operators.clone()))
            .await
            .unwrap();
        assert_eq!(ids(&matched), vec![1], "{operators:?}");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn text_operators() {
    let engine = TestEngine::todos().await;
    let table = engine.table();
    for title in ["Buy milk", "buy bread", "Call mom"] {
        table.insert(todo(title, false, 0)).await.unwrap();
    }

    let exact = table
        .select(&Query::new().when("title", Operators::new().contains("buy")))
        .await
        .unwrap();
    assert_eq!(ids(&exact), vec![2]);

    let loose = table
        .select(&Query::new().when("title", Operators::new().loose_contains("BUY")))
        .await
        .unwrap();
    assert_eq!(ids(&loose), vec![1, 2]);

    let listed = table
        .select(&Query::new().when("title", Operators::new().in_array(["Call mom", "x"])))
        .await
        .unwrap();
    assert_eq!(ids(&listed), vec![3]);

    let empty = table
        .select(&Query::new().when("title", Operators::new()))
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn batch_update_is_best_effort_per_record() {
    let engine = scenarios::seeded_todos(3).await;
    let table = engine.table();
    engine.backend.inject(Fault::FailWrite {
        store: TODOS.to_string(),
        nth: 2,
        error: StorageError::Backend("write failed".to_string()),
    });

    let result = table
        .update(&Update::set(record! { "title" => "renamed" }))
        .await;

    assert_eq!(
        result,
        Err(EngineError::Storage(StorageError::Backend(
            "write failed".to_string()
        )))
    );
    let stored = engine.stored(TODOS);
    assert_eq!(stored[0].get("title"), Some(&Value::from("renamed")));
    assert_eq!(stored[1].get("title"), Some(&Value::from("todo 2")));
    // Writes are issued independently, so the third record is written too.
    assert_eq!(stored[2].get("title"), Some(&Value::from("renamed")));
}

#[tokio::test(flavor = "current_thread")]
async fn batch_delete_is_best_effort_per_record() {
    let engine = scenarios::seeded_todos(3).await;
    engine.backend.inject(Fault::FailWrite {
        store: TODOS.to_string(),
        nth: 2,
        error: StorageError::Backend("delete failed".to_string()),
    });

    let result = engine.table().delete(&Predicate::new()).await;

    assert!(matches!(result, Err(EngineError::Storage(_))));
    assert_eq!(ids(&engine.stored(TODOS)), vec![2]);
}

#[tokio::test(flavor = "current_thread")]
async fn transaction_abort_overrides_request_success() {
    let engine = TestEngine::todos().await;
    engine.backend.inject(Fault::AbortCommit {
        store: TODOS.to_string(),
        error: StorageError::Aborted("quota exceeded".to_string()),
    });

    let result = engine.table().insert(todo("lost", false, 0)).await;

    assert_eq!(result, Err(EngineError::transaction_aborted("quota exceeded")));
    assert!(engine.stored(TODOS).is_empty());

    // The failure is per call; the engine stays usable.
    engine.table().insert(todo("kept", false, 0)).await.unwrap();
    assert_eq!(engine.stored(TODOS).len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn unique_column_is_enforced_by_the_backend() {
    let schema = SchemaBuilder::new().store(
        "users",
        [
            ("id", number().primary_key().auto_increment().unwrap()),
            ("email", string().unique()),
        ],
    );
    let engine = TestEngine::open(MemoryBackend::new(), 1, schema).await;
    let users = engine.db.store("users").unwrap();

    users.insert(record! { "email" => "a@x" }).await.unwrap();
    let second = users.insert(record! { "email" => "a@x" }).await;

    assert!(matches!(
        second,
        Err(EngineError::Storage(StorageError::Constraint(_)))
    ));
    assert_eq!(users.count().await.unwrap(), 1);
}
