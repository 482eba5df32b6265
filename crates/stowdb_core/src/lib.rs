//! # StowDB Core
//!
//! Schema-driven data access over a request/event key-value backend.
//!
//! This crate provides:
//! - Column builders and the schema compiler ([`schema`])
//! - Database open with store and index materialization ([`Database`])
//! - Per-store CRUD ([`Table`]) through single-request transactions
//! - An in-memory query engine ([`query`])
//! - Structured warnings and lifecycle events ([`EventFeed`])
//!
//! Everything is single-threaded: handles are `Rc`-based and futures are
//! driven by the backend's completion events.
//!
//! ```rust
//! use std::rc::Rc;
//! use stowdb_codec::{record, Value};
//! use stowdb_core::query::{Direction, Query};
//! use stowdb_core::schema::{boolean, number, string, SchemaBuilder};
//! use stowdb_core::{Config, Database, Update};
//! use stowdb_storage::MemoryBackend;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let schema = SchemaBuilder::new().store("todos", [
//!     ("id", number().primary_key().auto_increment()?),
//!     ("title", string()),
//!     ("completed", boolean()),
//! ]);
//! let db = Database::connect(Rc::new(MemoryBackend::new()), Config::new("todo"), schema).await?;
//! let todos = db.store("todos")?;
//!
//! todos.insert(record! { "title" => "write docs", "completed" => false }).await?;
//! todos.update(&Update::set(record! { "completed" => true }).eq("id", 1)).await?;
//!
//! let done = todos
//!     .select(&Query::new().eq("completed", true).order_by("id", Direction::Desc))
//!     .await?;
//! assert_eq!(done[0].get("title"), Some(&Value::from("write docs")));
//! # Ok::<(), stowdb_core::EngineError>(())
//! # }).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binding;
mod clock;
mod config;
mod database;
mod error;
mod events;
mod future;
mod gateway;
pub mod query;
mod ready;
pub mod schema;
mod table;

pub use binding::EngineBinding;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use database::{delete_database, Database};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventFeed};
pub use future::EngineFuture;
pub use ready::DatabaseState;
pub use table::{Table, Update};
