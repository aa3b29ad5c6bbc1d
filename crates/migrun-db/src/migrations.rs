//! Caller-supplied migrations and validation of the request document.
//!
//! A request is accepted only if every entry is well formed, so nothing is
//! ever applied from a partially valid list.

use std::collections::HashSet;

use migrun_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named SQL statement. The `up` body is executed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
    pub up: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up: up.into(),
        }
    }
}

/// An ordered, validated list of migrations for one run.
#[derive(Debug, Clone)]
pub struct MigrationRequest {
    migrations: Vec<Migration>,
}

impl MigrationRequest {
    /// Validate typed input.
    pub fn new(migrations: Vec<Migration>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (index, migration) in migrations.iter().enumerate() {
            if migration.name.trim().is_empty() || migration.up.trim().is_empty() {
                return Err(missing_field(index));
            }
            if !seen.insert(migration.name.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate migration name '{}' at index {index}",
                    migration.name
                )));
            }
        }
        Ok(Self { migrations })
    }

    /// Validate a loosely typed document of the form
    /// `{ "migrations": [ { "name": ..., "up": ... }, ... ] }`.
    pub fn from_value(input: &Value) -> Result<Self> {
        let Some(entries) = input.get("migrations").and_then(Value::as_array) else {
            return Err(Error::Validation(
                "input migrations must be an array".into(),
            ));
        };

        let mut migrations = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if !entry.is_object() {
                return Err(Error::Validation(format!(
                    "migration at index {index} must be an object"
                )));
            }
            let name = required_str(entry, "name").ok_or_else(|| missing_field(index))?;
            let up = required_str(entry, "up").ok_or_else(|| missing_field(index))?;
            migrations.push(Migration::new(name, up));
        }

        Self::new(migrations)
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

fn required_str<'a>(entry: &'a Value, field: &str) -> Option<&'a str> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn missing_field(index: usize) -> Error {
    Error::Validation(format!(
        "migration at index {index} is missing 'name' or 'up'"
    ))
}
