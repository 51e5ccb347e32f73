//! Session factory and transaction scoping.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::schema;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The local store.
///
/// A `Store` is a cheap, cloneable session factory. It holds no open
/// connection itself; every [`Session`] owns its own connection so that
/// concurrent workers never share one. Writers are serialized by SQLite's
/// own locking, bounded by [`StoreConfig::busy_timeout`].
///
/// # Example
///
/// ```no_run
/// use refsync_store::{NewLocation, Store, StoreConfig, StoreError, Tables};
///
/// let store = Store::open(StoreConfig::new("refsync.db"))?;
/// let mut session = store.session()?;
/// session.transaction(|tx| {
///     tx.locations().insert(&NewLocation {
///         name: "North depot".into(),
///         external_key: Some(5),
///     })?;
///     Ok::<_, StoreError>(())
/// })?;
/// # Ok::<(), StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    config: Arc<StoreConfig>,
}

impl Store {
    /// Opens the store, creating the database file and missing tables.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = connect(&config)?;
        // WAL lets readers proceed while one writer holds the lock.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        if config.bootstrap_schema {
            schema::bootstrap(&conn)?;
        }
        info!("Opened local store at {:?}", config.path);

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens a new session with its own connection.
    pub fn session(&self) -> StoreResult<Session> {
        Ok(Session {
            conn: connect(&self.config)?,
        })
    }

    /// Runs `f` inside a transaction on a fresh session.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut session = self.session()?;
        session.transaction(f)
    }
}

fn connect(config: &StoreConfig) -> StoreResult<Connection> {
    let conn = Connection::open(&config.path)?;
    conn.busy_timeout(config.busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// A unit of work against the local store.
///
/// Dropping a session closes its connection.
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Returns the underlying connection for reads outside a transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside a write transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back if `f`
    /// returns `Err` or panics. The write lock is taken up front, so two
    /// sessions never deadlock upgrading from read to write.
    pub fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        let value = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        debug!("Transaction committed");
        Ok(value)
    }
}

/// Runs `f` inside a named savepoint on `conn`.
///
/// On `Ok` the savepoint is released into the enclosing transaction; on
/// `Err` every write made by `f` is undone and the enclosing transaction
/// stays usable.
pub fn with_savepoint<T, E, F>(conn: &Connection, name: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<StoreError>,
{
    conn.execute_batch(&format!("SAVEPOINT {name}"))
        .map_err(StoreError::from)?;

    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))
                .map_err(StoreError::from)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
            {
                warn!(savepoint = name, error = %rollback, "Savepoint rollback failed");
            }
            Err(e)
        }
    }
}
