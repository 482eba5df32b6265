//! Engine event feed.
//!
//! Warnings and lifecycle changes are delivered as [`EngineEvent`] values
//! as well as logged, so callers and tests can observe them:
//!
//! ```rust,ignore
//! let db = Database::connect(backend, Config::new("app").version(2), schema).await?;
//!
//! for event in db.events().history() {
//!     if let EngineEvent::StoreSkipped { store } = event {
//!         println!("kept existing store {store}");
//!     }
//! }
//! ```

use crate::schema::SchemaWarning;
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::cell::RefCell;

/// Something the engine reports without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A column builder raised a warning.
    SchemaWarning(SchemaWarning),
    /// An upgrade found the store already present and left it untouched.
    StoreSkipped {
        /// Store name.
        store: String,
    },
    /// An upgrade found the index already present.
    IndexSkipped {
        /// Store name.
        store: String,
        /// Index name.
        index: String,
    },
    /// The upgrade path ran.
    Upgraded {
        /// Version found in the backend (0 for a new database).
        old_version: u32,
        /// Version now stored.
        new_version: u32,
    },
    /// The database became ready.
    Ready {
        /// Open version.
        version: u32,
    },
    /// Another open requested a newer version; this handle was closed and
    /// must be discarded.
    ReloadRequired {
        /// Version this handle had open.
        old_version: u32,
        /// Requested version, or `None` when the database is being deleted.
        new_version: Option<u32>,
    },
}

impl EngineEvent {
    /// Whether the event is a warning.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            EngineEvent::SchemaWarning(_)
                | EngineEvent::StoreSkipped { .. }
                | EngineEvent::IndexSkipped { .. }
        )
    }

    fn log(&self) {
        match self {
            EngineEvent::SchemaWarning(w) => {
                tracing::warn!(store = %w.store, column = %w.column, "{}", w.warning);
            }
            EngineEvent::StoreSkipped { store } => {
                tracing::warn!(%store, "store already exists, skipping creation");
            }
            EngineEvent::IndexSkipped { store, index } => {
                tracing::warn!(%store, %index, "index already exists, skipping creation");
            }
            EngineEvent::Upgraded {
                old_version,
                new_version,
            } => {
                tracing::info!(old_version, new_version, "schema upgraded");
            }
            EngineEvent::Ready { version } => {
                tracing::info!(version, "database ready");
            }
            EngineEvent::ReloadRequired {
                old_version,
                new_version,
            } => {
                tracing::info!(old_version, ?new_version, "version change, reload required");
            }
        }
    }
}

/// Distributes engine events to subscribers and keeps a bounded history.
pub struct EventFeed {
    subscribers: RefCell<Vec<UnboundedSender<EngineEvent>>>,
    history: RefCell<Vec<EngineEvent>>,
    max_history: usize,
}

impl EventFeed {
    /// Creates a feed keeping the last 1000 events.
    pub fn new() -> Self {
        Self::with_max_history(1000)
    }

    /// Creates a feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            history: RefCell::new(Vec::new()),
            max_history,
        }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    /// Logs `event`, records it and sends it to every live subscriber.
    pub fn emit(&self, event: EngineEvent) {
        event.log();

        {
            let mut history = self.history.borrow_mut();
            history.push(event.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    /// Recorded events, oldest first.
    pub fn history(&self) -> Vec<EngineEvent> {
        self.history.borrow().clone()
    }

    /// Recorded warnings, oldest first.
    pub fn warnings(&self) -> Vec<EngineEvent> {
        self.history
            .borrow()
            .iter()
            .filter(|event| event.is_warning())
            .cloned()
            .collect()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("history_len", &self.history.borrow().len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
