//! Lifecycle binding for UI layers.

use crate::config::Config;
use crate::database::Database;
use crate::error::{EngineError, EngineResult};
use crate::schema::SchemaBuilder;
use std::rc::Rc;
use stowdb_storage::StorageBackend;

/// The engine as a UI component sees it: a handle plus two flags.
///
/// Created once per mount with [`EngineBinding::mount`] and passed down
/// explicitly. The default value is the state before mounting.
#[derive(Debug, Default)]
pub struct EngineBinding {
    /// The ready handle; `None` before mounting or after a failed open.
    pub db: Option<Database>,
    /// `true` once the database is ready.
    pub is_ready: bool,
    /// Why opening failed.
    pub init_error: Option<EngineError>,
}

impl EngineBinding {
    /// Opens the database and records the outcome.
    pub async fn mount(
        backend: Rc<dyn StorageBackend>,
        config: Config,
        schema: SchemaBuilder,
    ) -> Self {
        match Database::connect(backend, config, schema).await {
            Ok(db) => Self {
                db: Some(db),
                is_ready: true,
                init_error: None,
            },
            Err(error) => {
                tracing::warn!(%error, "database failed to initialize");
                Self {
                    db: None,
                    is_ready: false,
                    init_error: Some(error),
                }
            }
        }
    }

    /// The handle, or the reason there is none.
    ///
    /// # Errors
    ///
    /// Returns the initialization error, or [`EngineError::NotOpen`] if the
    /// binding was never mounted.
    pub fn database(&self) -> EngineResult<&Database> {
        match (&self.db, &self.init_error) {
            (Some(db), _) => Ok(db),
            (None, Some(error)) => Err(error.clone()),
            (None, None) => Err(EngineError::NotOpen),
        }
    }
}
