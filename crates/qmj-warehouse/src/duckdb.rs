//! `DuckDB` connection pool management.
//!
//! One database instance is opened per pool. Every pooled connection is a
//! clone of the root connection, so all of them share the same catalog and
//! transaction manager instead of competing for the database file lock.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ::duckdb::Connection;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// A database file, created on first open.
    File(PathBuf),
    /// A private in-memory database, dropped with the last connection.
    InMemory,
}

impl DatabaseLocation {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path.as_path()),
            Self::InMemory => None,
        }
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::InMemory => f.write_str(":memory:"),
        }
    }
}

struct PoolInner {
    location: DatabaseLocation,
    max_pool_size: usize,
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
}

/// A connection pool manager for `DuckDB` connections.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Open the database at `location` and create a pool over it.
    ///
    /// At most `max_pool_size` idle connections are retained; more may be
    /// handed out concurrently.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or configured.
    pub fn open(location: DatabaseLocation, max_pool_size: usize) -> Result<Self, ::duckdb::Error> {
        let root = match &location {
            DatabaseLocation::File(path) => Connection::open(path)?,
            DatabaseLocation::InMemory => Connection::open_in_memory()?,
        };
        configure_connection(&root)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                location,
                max_pool_size: max_pool_size.max(1),
                root: Mutex::new(root),
                idle: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Acquire a connection from the pool, cloning a new one if none is idle.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be cloned or configured.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let idle = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let connection = match idle {
            Some(connection) => connection,
            None => {
                let connection = self
                    .inner
                    .root
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .try_clone()?;
                configure_connection(&connection)?;
                connection
            }
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.inner.location
    }

    /// Path to the database file, `None` for in-memory databases.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.inner.location.path()
    }

    /// Number of idle connections currently held.
    pub fn idle_count(&self) -> usize {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.pool.max_pool_size {
            idle.push(connection);
        }
    }
}

fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_connections_share_one_database() {
        let manager =
            DuckDbConnectionManager::open(DatabaseLocation::InMemory, 2).expect("open pool");

        let first = manager.acquire().expect("first connection");
        let second = manager.acquire().expect("second connection");
        first
            .execute_batch("CREATE TABLE shared (id INTEGER); INSERT INTO shared VALUES (7);")
            .expect("create");
        let value: i32 = second
            .query_row("SELECT id FROM shared", [], |row| row.get(0))
            .expect("visible from clone");
        assert_eq!(value, 7);
    }

    #[test]
    fn retains_at_most_max_pool_size_idle_connections() {
        let manager =
            DuckDbConnectionManager::open(DatabaseLocation::InMemory, 1).expect("open pool");
        {
            let _a = manager.acquire().expect("a");
            let _b = manager.acquire().expect("b");
        }
        assert_eq!(manager.idle_count(), 1);
        assert!(manager.db_path().is_none());
    }
}
