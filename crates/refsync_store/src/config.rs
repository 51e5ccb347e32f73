//! Store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for opening the local store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,

    /// How long a connection waits on a lock held by another connection.
    pub busy_timeout: Duration,

    /// Whether to create missing tables on open.
    pub bootstrap_schema: bool,
}

impl StoreConfig {
    /// Creates a configuration for the database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: Duration::from_secs(30),
            bootstrap_schema: true,
        }
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether missing tables are created on open.
    #[must_use]
    pub fn with_bootstrap_schema(mut self, bootstrap: bool) -> Self {
        self.bootstrap_schema = bootstrap;
        self
    }
}
