use std::path::Path;
use std::time::Duration;

use migrun_common::{Error, Result};
use migrun_config::DatabaseConfig;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

/// Opens a fresh database handle for a single run.
pub trait Connector {
    fn connect(&self) -> Result<DbHandle>;
}

/// One open connection, owned by the run that acquired it.
///
/// Call [`DbHandle::close`] to release it and observe close errors. A handle
/// that is simply dropped still releases its connection.
pub struct DbHandle {
    conn: Connection,
}

impl DbHandle {
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        debug!("opening database at {}", path.display());
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()
                .map_err(|e| Error::Storage(format!("failed to open in-memory database: {e}")))?
        } else {
            Connection::open(path)
                .map_err(|e| Error::Storage(format!("failed to open database: {e}")))?
        };

        conn.busy_timeout(busy_timeout)
            .map_err(|e| Error::Storage(format!("failed to set busy timeout: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Storage(format!("failed to set pragmas: {e}")))?;

        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"), Duration::ZERO)
    }

    /// Run `sql` as one opaque unit. The driver error is returned untouched
    /// so the caller can attribute it.
    pub fn execute_raw(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    /// Open a transaction on this handle. Dropping it without `commit`
    /// rolls back everything executed through the handle since.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .map_err(|e| Error::Storage(format!("failed to begin transaction: {e}")))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| Error::Storage(format!("failed to close database: {e}")))?;
        info!("database connection closed");
        Ok(())
    }
}

/// Connects to the SQLite database described by a [`DatabaseConfig`].
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    config: DatabaseConfig,
}

impl SqliteConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

impl Connector for SqliteConnector {
    fn connect(&self) -> Result<DbHandle> {
        DbHandle::open(
            &self.config.path,
            Duration::from_millis(self.config.busy_timeout_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_raw_runs_multi_statement_bodies() {
        let handle = DbHandle::in_memory().unwrap();
        handle
            .execute_raw(
                "CREATE TABLE t(x int); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
            )
            .unwrap();

        let count: i64 = handle
            .connection()
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
        handle.close().unwrap();
    }

    #[test]
    fn execute_raw_surfaces_driver_errors() {
        let handle = DbHandle::in_memory().unwrap();
        assert!(handle.execute_raw("garbage sql").is_err());
    }

    #[test]
    fn dropped_transaction_discards_partial_body() {
        let handle = DbHandle::in_memory().unwrap();
        {
            let _tx = handle.begin().unwrap();
            assert!(handle.execute_raw("CREATE TABLE p(x int); garbage sql").is_err());
        }
        handle.execute_raw("CREATE TABLE p(x int)").unwrap();
    }

    #[test]
    fn connector_opens_file_database_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let connector = SqliteConnector::new(DatabaseConfig::at(dir.path().join("app.db")));

        let first = connector.connect().unwrap();
        first.execute_raw("CREATE TABLE kept(x int)").unwrap();
        first.close().unwrap();

        let second = connector.connect().unwrap();
        second.execute_raw("INSERT INTO kept VALUES (1)").unwrap();
        second.close().unwrap();
    }

    #[test]
    fn connector_reports_unopenable_path_as_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::at(dir.path().join("missing").join("app.db"));
        let err = SqliteConnector::new(config).connect().err().unwrap();
        assert_eq!(err.kind(), migrun_common::ErrorKind::Storage);
    }
}
