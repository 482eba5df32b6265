//! # StowDB Testkit
//!
//! Test utilities for StowDB.
//!
//! This crate provides:
//! - The todo schema and engines opened over an in-memory backend
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stowdb_testkit::prelude::*;
//!
//! #[tokio::test(flavor = "current_thread")]
//! async fn test_with_database() {
//!     let engine = TestEngine::todos().await;
//!     engine.table().insert(todo("a", false, 0)).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
