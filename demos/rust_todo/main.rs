//! Basic StowDB Example - Todo Application
//!
//! This example demonstrates core StowDB functionality:
//! - Declaring a schema with column builders
//! - Opening a database and creating stores
//! - Insert, select, update and delete through a table
//! - Filtering, ordering and limiting with queries
//! - Reopening at a newer version
//!
//! Run with: RUST_LOG=info cargo run -p rust_todo

use std::rc::Rc;
use stowdb_codec::{record, to_json_string, Map, Value};
use stowdb_core::query::{Direction, Operators, Predicate, Query};
use stowdb_core::schema::{boolean, date, number, string, SchemaBuilder};
use stowdb_core::{Config, Database, EngineError, EngineEvent, Update};
use stowdb_storage::MemoryBackend;
use tracing_subscriber::EnvFilter;

/// A todo as the application sees it.
#[derive(Debug, Clone)]
struct Todo {
    id: Option<i64>,
    title: String,
    completed: bool,
    priority: i64,
    created_at: i64,
}

impl Todo {
    fn new(title: &str, priority: i64, created_at: i64) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            completed: false,
            priority,
            created_at,
        }
    }

    /// Row for insert; the key is left to the store.
    fn to_record(&self) -> Map {
        record! {
            "title" => self.title.as_str(),
            "completed" => self.completed,
            "priority" => self.priority,
            "createdAt" => Value::Date(self.created_at),
        }
    }

    fn from_record(value: &Value) -> Result<Self, String> {
        let text = |field: &str| value.get(field).and_then(Value::as_text).map(String::from);
        Ok(Todo {
            id: value.get("id").and_then(Value::as_integer),
            title: text("title").ok_or("missing title")?,
            completed: value
                .get("completed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            priority: value
                .get("priority")
                .and_then(Value::as_integer)
                .unwrap_or(0),
            created_at: value
                .get("createdAt")
                .and_then(Value::as_date)
                .ok_or("missing createdAt")?,
        })
    }
}

fn schema() -> Result<SchemaBuilder, EngineError> {
    Ok(SchemaBuilder::new()
        .store(
            "todos",
            [
                ("id", number().primary_key().auto_increment()?),
                ("title", string()),
                ("completed", boolean()),
                ("priority", number()),
                ("createdAt", date()),
                ("updatedAt", date().nullable()),
            ],
        )
        .touch_on_update("todos", "updatedAt"))
}

fn print_todos(heading: &str, records: &[Value]) {
    println!("\n{heading}");
    for todo in records.iter().filter_map(|r| Todo::from_record(r).ok()) {
        let status = if todo.completed { "✓" } else { "○" };
        println!(
            "  {} #{} [P{}] {}",
            status,
            todo.id.unwrap_or_default(),
            todo.priority,
            todo.title
        );
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Todo Application Example");
    println!("========================\n");

    let backend = MemoryBackend::new();
    let db = Database::connect(Rc::new(backend.clone()), Config::new("todo"), schema()?).await?;
    println!("[OK] Database opened, stores: {:?}", db.store_names());

    let todos = db.store("todos")?;

    let mut seed = vec![
        Todo::new("Learn StowDB", 1, 1_700_000_000_000),
        Todo::new("Build an app", 2, 1_700_000_100_000),
        Todo::new("Write tests", 1, 1_700_000_200_000),
        Todo::new("Deploy to production", 3, 1_700_000_300_000),
    ];
    seed[2].completed = true;

    println!("\n[+] Inserting {} todos...", seed.len());
    for todo in &seed {
        let key = todos.insert(todo.to_record()).await?;
        println!("  inserted key {}", to_json_string(&key));
    }

    print_todos("[*] All todos:", &todos.get_all().await?);

    let urgent = todos
        .select(
            &Query::new()
                .eq("completed", false)
                .when("priority", Operators::new().less_than_or_equal(1)),
        )
        .await?;
    print_todos("[!] High-priority incomplete todos:", &urgent);

    let newest = todos
        .select(&Query::new().order_by("createdAt", Direction::Desc).limit(2))
        .await?;
    print_todos("[^] Two newest todos:", &newest);

    println!("\n[~] Completing 'Learn StowDB'...");
    let changed = todos
        .update(&Update::set(record! { "completed" => true }).eq("title", "Learn StowDB"))
        .await?;
    println!("[OK] Updated {changed} todo(s)");
    if let Some(updated) = todos
        .select(&Query::new().eq("title", "Learn StowDB"))
        .await?
        .first()
    {
        println!("  stored as {}", to_json_string(updated));
    }

    let all = todos.get_all().await?;
    let (completed, incomplete): (Vec<_>, Vec<_>) = all
        .iter()
        .partition(|t| t.get("completed") == Some(&Value::Bool(true)));
    println!("\n[#] Summary:");
    println!("  Completed: {}", completed.len());
    println!("  Incomplete: {}", incomplete.len());

    println!("\n[-] Deleting completed todos...");
    let removed = todos
        .delete(&Predicate::new().eq("completed", true))
        .await?;
    println!("[OK] Removed {removed}, remaining: {}", todos.count().await?);

    db.close();
    println!("\n[*] Database closed ({:?})", db.state());

    println!("\n[>] Reopening at version 2...");
    let v2 = Database::connect(Rc::new(backend), Config::new("todo").version(2), schema()?).await?;
    for event in v2.events().warnings() {
        if let EngineEvent::StoreSkipped { store } = event {
            println!("  kept existing store '{store}'");
        }
    }
    println!("[OK] Version {} ready, {} todo(s) kept", v2.version(), v2.store("todos")?.count().await?);

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tokio::runtime::Builder::new_current_thread()
        .build()?
        .block_on(run())
}
