//! Test fixtures and database helpers.
//!
//! Provides the todo schema used across the test suites and engines opened
//! over a [`MemoryBackend`] with a [`ManualClock`].

use std::rc::Rc;
use stowdb_codec::{record, Map, Value};
use stowdb_core::schema::{boolean, date, number, string, SchemaBuilder};
use stowdb_core::{Config, Database, ManualClock, Table};
use stowdb_storage::MemoryBackend;

/// Database name used by [`TestEngine`].
pub const TEST_DB: &str = "stowdb_test";

/// Store name of the todo schema.
pub const TODOS: &str = "todos";

/// Time the fixture clock starts at.
pub const CLOCK_START: i64 = 1_700_000_000_000;

/// The todo schema: an auto-increment key, required text and flag
/// columns, a creation date and a nullable last-modified date stamped on
/// update.
pub fn todo_schema() -> SchemaBuilder {
    SchemaBuilder::new()
        .store(
            TODOS,
            [
                (
                    "id",
                    number()
                        .primary_key()
                        .auto_increment()
                        .expect("NUMBER primary key accepts auto_increment"),
                ),
                ("title", string()),
                ("content", string()),
                ("completed", boolean()),
                ("createdAt", date()),
                ("updatedAt", date().nullable()),
            ],
        )
        .touch_on_update(TODOS, "updatedAt")
}

/// A todo row without a key.
pub fn todo(title: &str, completed: bool, created_at: i64) -> Map {
    record! {
        "title" => title,
        "content" => format!("{title} details"),
        "completed" => completed,
        "createdAt" => Value::Date(created_at),
        "updatedAt" => Value::Null,
    }
}

/// An open database over a private [`MemoryBackend`].
pub struct TestEngine {
    /// The ready handle.
    pub db: Database,
    /// The backend, for inspection and fault injection.
    pub backend: MemoryBackend,
    /// The clock update stamping reads.
    pub clock: Rc<ManualClock>,
}

impl TestEngine {
    /// Opens [`todo_schema`] at version 1 on a fresh backend.
    pub async fn todos() -> Self {
        Self::open(MemoryBackend::new(), 1, todo_schema()).await
    }

    /// Opens `schema` at `version` on `backend`.
    ///
    /// # Panics
    ///
    /// Panics if the database does not become ready.
    pub async fn open(backend: MemoryBackend, version: u32, schema: SchemaBuilder) -> Self {
        let clock = Rc::new(ManualClock::new(CLOCK_START));
        let config = Config::new(TEST_DB)
            .version(version)
            .clock(Rc::clone(&clock) as Rc<dyn stowdb_core::Clock>);
        let db = Database::connect(Rc::new(backend.clone()), config, schema)
            .await
            .expect("test database should open");
        Self { db, backend, clock }
    }

    /// The todos table.
    ///
    /// # Panics
    ///
    /// Panics if the schema has no `todos` store.
    pub fn table(&self) -> Table {
        self.db.store(TODOS).expect("todos store is declared")
    }

    /// Records currently stored in `store`, read straight from the backend.
    ///
    /// # Panics
    ///
    /// Panics if the backend cannot decode the store.
    pub fn stored(&self, store: &str) -> Vec<Value> {
        self.backend
            .records(TEST_DB, store)
            .expect("stored records decode")
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Opens the todo schema and inserts `count` todos. Todo `i` (from 1)
    /// is completed when `i` is odd and created at `CLOCK_START + i`.
    pub async fn seeded_todos(count: usize) -> TestEngine {
        let engine = TestEngine::todos().await;
        let table = engine.table();
        for i in 1..=count {
            let offset = i64::try_from(i).expect("seed count fits in i64");
            table
                .insert(todo(&format!("todo {i}"), i % 2 == 1, CLOCK_START + offset))
                .await
                .expect("seed insert");
        }
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn todo_engine_is_ready() {
        let engine = TestEngine::todos().await;
        assert_eq!(engine.store_names(), vec![TODOS.to_string()]);
        assert!(engine.stored(TODOS).is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn seeded_scenario() {
        let engine = scenarios::seeded_todos(3).await;
        let stored = engine.stored(TODOS);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].get("completed"), Some(&Value::Bool(true)));
        assert_eq!(stored[1].get("completed"), Some(&Value::Bool(false)));
    }
}
