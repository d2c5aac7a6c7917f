//! Connection pool and schema for the defect store.
//!
//! All connections in a [`DefectStore`] are clones of one `DuckDB`
//! database instance, so each caller works in its own transaction while
//! seeing the same data.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use duckdb::Connection;

use crate::DbError;

/// Round-robin pool of `DuckDB` connections to one defect database.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so each connection is
/// wrapped in a `Mutex`. The pool hands out connections round-robin via
/// an atomic counter, allowing concurrent units of work on different
/// connections.
pub struct DefectStore {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl DefectStore {
    /// Opens (or creates) the database file at `path` with `size` pooled
    /// connections and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory, connection, or schema cannot
    /// be created.
    pub fn open(path: &Path, size: usize) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, size)
    }

    /// Opens a private in-memory database with `size` pooled connections.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory(size: usize) -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?, size)
    }

    fn from_connection(conn: Connection, size: usize) -> Result<Self, DbError> {
        create_schema(&conn)?;

        let size = size.max(1);
        let mut connections = Vec::with_capacity(size);
        for _ in 1..size {
            connections.push(Mutex::new(conn.try_clone()?));
        }
        connections.push(Mutex::new(conn));

        log::debug!("Opened defect store with {size} connection(s)");

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Acquires the next connection from the pool (round-robin).
    ///
    /// The connection is released when the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::PoolPoisoned`] if a previous holder panicked.
    pub fn acquire(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[idx]
            .lock()
            .map_err(|_| DbError::PoolPoisoned)
    }

    /// Number of pooled connections.
    #[must_use]
    pub fn size(&self) -> usize {
        self.connections.len()
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS defects (
            id TEXT PRIMARY KEY,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL,
            geom_wkt TEXT,
            address_text TEXT,
            length_m DOUBLE,
            width_m DOUBLE,
            depth_m DOUBLE,
            status TEXT NOT NULL DEFAULT 'reported',
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            priority_score DOUBLE,
            duplicate_cluster_id TEXT,
            report_count BIGINT NOT NULL DEFAULT 1 CHECK (report_count >= 1),
            first_report_at TIMESTAMP NOT NULL,
            last_report_at TIMESTAMP NOT NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY,
            defect_id TEXT NOT NULL,
            reporter_id TEXT,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL,
            description TEXT,
            severity TEXT,
            photo_count INTEGER NOT NULL DEFAULT 0,
            source TEXT NOT NULL DEFAULT 'app',
            context_tag TEXT,
            created_at TIMESTAMP NOT NULL
        );

        CREATE TABLE IF NOT EXISTS photos (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL,
            defect_id TEXT NOT NULL,
            reporter_id TEXT,
            url TEXT NOT NULL CHECK (length(url) BETWEEN 1 AND 2048),
            thumbnail_url TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reporters (
            id TEXT PRIMARY KEY,
            display_name TEXT,
            created_at TIMESTAMP NOT NULL
        );",
    )?;

    Ok(())
}

/// Counts the rows of a table. Test helper.
#[cfg(test)]
pub(crate) fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();
        create_schema(&conn).unwrap();
        assert_eq!(count_rows(&conn, "defects"), 0);
    }

    #[test]
    fn pooled_connections_share_one_database() {
        let store = DefectStore::open_in_memory(3).unwrap();
        assert_eq!(store.size(), 3);

        store
            .acquire()
            .unwrap()
            .execute(
                "INSERT INTO reporters (id, display_name, created_at)
                 VALUES ('r1', NULL, '2024-01-01 00:00:00')",
                [],
            )
            .unwrap();

        for _ in 0..3 {
            assert_eq!(count_rows(&store.acquire().unwrap(), "reporters"), 1);
        }
    }

    #[test]
    fn zero_size_pool_gets_one_connection() {
        let store = DefectStore::open_in_memory(0).unwrap();
        assert_eq!(store.size(), 1);
    }
}
