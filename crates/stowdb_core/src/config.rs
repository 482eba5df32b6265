//! Database configuration.

use crate::clock::{Clock, SystemClock};
use std::rc::Rc;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database name passed to the backend.
    pub name: String,

    /// Schema version. Raising it runs the upgrade path.
    pub version: u32,

    /// Time source for update stamping.
    pub clock: Rc<dyn Clock>,
}

impl Config {
    /// Creates a configuration for `name` at version 1.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            clock: Rc::new(SystemClock),
        }
    }

    /// Sets the schema version.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
