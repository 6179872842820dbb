//! Connection registry.
//!
//! Holds one live handle per database name. Handles are opened lazily on
//! first use and kept until they are invalidated or the registry is closed.
//! There is no background reconnection: a handle that fails stays failed
//! until someone drops it, and the next lookup for that name opens a new one.

use crate::db::driver::{Driver, DriverConnection};
use crate::error::{DbError, DbResult};
use crate::models::ConnectionConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// A live handle to one named database, owned by the registry.
pub struct ManagedConnection {
    database: String,
    handle: Box<dyn DriverConnection>,
    opened_at: Instant,
}

impl ManagedConnection {
    /// The database name this handle was opened for.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The underlying driver handle.
    pub fn handle(&self) -> &dyn DriverConnection {
        self.handle.as_ref()
    }

    /// How long the handle has been open.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    async fn close(&self) {
        self.handle.close().await;
        info!(database = %self.database, "Connection closed");
    }
}

impl fmt::Debug for ManagedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("database", &self.database)
            .field("age", &self.age())
            .finish()
    }
}

type Slot = Arc<OnceCell<Arc<ManagedConnection>>>;

pub struct ConnectionRegistry {
    driver: Arc<dyn Driver>,
    config: ConnectionConfig,
    connect_timeout: Duration,
    slots: RwLock<HashMap<String, Slot>>,
}

impl ConnectionRegistry {
    /// Create a registry that opens handles through `driver`.
    pub fn new(driver: Arc<dyn Driver>, config: ConnectionConfig) -> Self {
        Self {
            driver,
            config,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Set the timeout applied to each connect attempt.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Get the handle for `database`, opening it on first use.
    ///
    /// An empty name means the configured default database and shares its
    /// handle. Concurrent first lookups of the same name share a single
    /// connect attempt. A failed attempt is not cached.
    pub async fn get_connection(&self, database: &str) -> DbResult<Arc<ManagedConnection>> {
        let key = self.slot_key(database);
        let slot = self.slot(key).await;
        let connection = slot.get_or_try_init(|| self.open(key)).await?;
        Ok(Arc::clone(connection))
    }

    fn slot_key<'a>(&'a self, database: &'a str) -> &'a str {
        self.config.resolve_database(database).unwrap_or(database)
    }

    /// Find or insert the slot for a name; the map lock covers only this step.
    async fn slot(&self, database: &str) -> Slot {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(database) {
                return Arc::clone(slot);
            }
        }

        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(database.to_string()).or_default())
    }

    async fn open(&self, database: &str) -> DbResult<Arc<ManagedConnection>> {
        info!(
            database = %database,
            driver = %self.driver.kind(),
            "Connecting to database"
        );

        let handle = match timeout(
            self.connect_timeout,
            self.driver.connect(&self.config, database),
        )
        .await
        {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                warn!(database = %database, error = %e, "Failed to connect");
                return Err(e);
            }
            Err(_) => {
                warn!(database = %database, "Connect attempt timed out");
                return Err(DbError::timeout("connect", self.connect_timeout.as_secs()));
            }
        };

        info!(database = %database, "Connected successfully");
        Ok(Arc::new(ManagedConnection {
            database: database.to_string(),
            handle,
            opened_at: Instant::now(),
        }))
    }

    /// Drop the handle for `database` so the next lookup reconnects.
    ///
    /// Returns true if an open handle was closed.
    pub async fn invalidate(&self, database: &str) -> bool {
        let key = self.slot_key(database);
        let slot = {
            let mut slots = self.slots.write().await;
            slots.remove(key)
        };

        match slot.as_deref().and_then(OnceCell::get) {
            Some(connection) => {
                debug!(database = %key, "Dropping connection");
                connection.close().await;
                true
            }
            None => false,
        }
    }

    /// Drop `connection` only if it is still the registered handle for its
    /// database. A handle that was already replaced is left alone, so a late
    /// failure cannot tear down its successor.
    pub async fn invalidate_if(&self, connection: &Arc<ManagedConnection>) -> bool {
        let database = connection.database();
        let removed = {
            let mut slots = self.slots.write().await;
            let current = slots
                .get(database)
                .and_then(|slot| slot.get())
                .is_some_and(|registered| Arc::ptr_eq(registered, connection));
            if current {
                slots.remove(database)
            } else {
                None
            }
        };

        match removed {
            Some(_) => {
                debug!(database = %database, "Dropping connection");
                connection.close().await;
                true
            }
            None => false,
        }
    }

    /// Close every open handle. Safe to call more than once.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Slot)> = {
            let mut slots = self.slots.write().await;
            slots.drain().collect()
        };

        for (_, slot) in drained {
            if let Some(connection) = slot.get() {
                connection.close().await;
            }
        }
    }

    /// Names of the databases with an open handle.
    pub async fn open_databases(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of open handles.
    pub async fn connection_count(&self) -> usize {
        self.open_databases().await.len()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("driver", &self.driver.kind())
            .field("config", &self.config)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
