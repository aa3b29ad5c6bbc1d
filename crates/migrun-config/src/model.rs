use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LEDGER_TABLE: &str = "_migrations";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
}

/// Connection parameters for the target database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file. `:memory:` opens a private in-memory database.
    pub path: PathBuf,
    /// Table that records applied migrations.
    pub ledger_table: String,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("migrun.db"),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}
