use std::collections::HashSet;

use chrono::{DateTime, Utc};
use migrun_common::{Error, Result};
use rusqlite::{Connection, params, types::Type};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One applied migration as recorded in the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub name: String,
    pub batch: i64,
    pub applied_at: DateTime<Utc>,
}

/// Durable record of applied migrations. Rows are only ever inserted.
pub struct LedgerStore<'a> {
    conn: &'a Connection,
    table: &'a str,
}

/// Ledger table names are interpolated into SQL, so only plain identifiers
/// are accepted. SQLite reserves the `sqlite_` prefix.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::Validation(format!(
            "invalid ledger table name '{table}'"
        )));
    }
    if table.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(Error::Validation(format!(
            "ledger table name '{table}' uses the reserved sqlite_ prefix"
        )));
    }
    Ok(())
}

impl<'a> LedgerStore<'a> {
    pub fn new(conn: &'a Connection, table: &'a str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self { conn, table })
    }

    /// Create the ledger table if it does not exist yet.
    pub fn ensure_ready(&self) -> Result<()> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT count(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                params![self.table],
                |row| row.get(0),
            )
            .map_err(|e| Error::Storage(format!("failed to check ledger table: {e}")))?;

        if !exists {
            info!("creating migrations table: {}", self.table);
            self.conn
                .execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS [{}] (
                        name TEXT PRIMARY KEY,
                        batch INTEGER NOT NULL,
                        migration_time TEXT NOT NULL
                    )",
                    self.table
                ))
                .map_err(|e| Error::Storage(format!("failed to create ledger table: {e}")))?;
        }

        Ok(())
    }

    pub fn load_applied_names(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT name FROM [{}]", self.table))
            .map_err(|e| Error::Storage(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Storage(format!("failed to query applied migrations: {e}")))?;

        rows.collect::<std::result::Result<HashSet<_>, _>>()
            .map_err(|e| Error::Storage(format!("failed to read ledger row: {e}")))
    }

    /// `max(batch) + 1`, or 1 for an empty ledger.
    pub fn next_batch_number(&self) -> Result<i64> {
        let max: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT MAX(batch) FROM [{}]", self.table),
                [],
                |row| row.get(0),
            )
            .map_err(|e| Error::Storage(format!("failed to read batch number: {e}")))?;
        Ok(max.unwrap_or(0) + 1)
    }

    pub fn record(&self, name: &str, batch: i64, applied_at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO [{}] (name, batch, migration_time) VALUES (?1, ?2, ?3)",
                    self.table
                ),
                params![name, batch, applied_at.to_rfc3339()],
            )
            .map_err(|e| Error::Storage(format!("failed to record migration {name}: {e}")))?;
        Ok(())
    }

    /// All entries, oldest batch first.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT name, batch, migration_time FROM [{}]
                 ORDER BY batch ASC, migration_time ASC, name ASC",
                self.table
            ))
            .map_err(|e| Error::Storage(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(LedgerEntry {
                    name: row.get(0)?,
                    batch: row.get(1)?,
                    applied_at: parse_datetime(&row.get::<_, String>(2)?).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                    })?,
                })
            })
            .map_err(|e| Error::Storage(format!("failed to query ledger: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Storage(format!("failed to read ledger row: {e}")))
    }
}

fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
