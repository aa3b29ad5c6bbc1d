//! Per-invocation orchestration of the ledger, planner and applier.
//!
//! Each run opens its own connection and closes it on every exit path.
//! Concurrent runs against the same database are not coordinated: two runs
//! reading the same ledger snapshot may both apply a new migration, and the
//! second ledger insert then fails with a storage error. SQLite's write lock
//! serializes the statements themselves, bounded by `busy_timeout_ms`.

use std::fmt;

use migrun_common::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::applier;
use crate::handle::{Connector, DbHandle};
use crate::ledger::{self, LedgerEntry, LedgerStore};
use crate::migrations::MigrationRequest;
use crate::planner;
use crate::status::{RunStatus, StatusReporter};

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub summary: String,
    pub applied: Vec<String>,
    pub skipped: usize,
    pub batch: i64,
}

impl RunOutcome {
    fn new(applied: Vec<String>, skipped: usize, batch: i64) -> Self {
        Self {
            summary: format!("Applied {}, skipped {skipped}.", applied.len()),
            applied,
            skipped,
            batch,
        }
    }
}

/// A failed run. `applied` lists migrations recorded before the failure;
/// they remain in the ledger.
#[derive(Debug)]
pub struct RunFailure {
    pub error: Error,
    pub applied: Vec<String>,
}

impl RunFailure {
    pub fn new(error: Error, applied: Vec<String>) -> Self {
        Self { error, applied }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<Error> for RunFailure {
    fn from(error: Error) -> Self {
        Self::new(error, Vec::new())
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Applies requested migrations that the ledger has not seen yet.
pub struct MigrationRunner<C> {
    connector: C,
    ledger_table: String,
}

impl<C: Connector> MigrationRunner<C> {
    pub fn new(connector: C, ledger_table: impl Into<String>) -> migrun_common::Result<Self> {
        let ledger_table = ledger_table.into();
        ledger::validate_table_name(&ledger_table)?;
        Ok(Self {
            connector,
            ledger_table,
        })
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Validate a loosely typed request document, then run it. Nothing
    /// touches the database if validation fails.
    pub fn run_value(
        &self,
        input: &Value,
        reporter: &dyn StatusReporter,
    ) -> Result<RunOutcome, RunFailure> {
        let request = match MigrationRequest::from_value(input) {
            Ok(request) => request,
            Err(e) => {
                let failure = RunFailure::from(e);
                reporter.report(&RunStatus::Failed {
                    message: failure.to_string(),
                });
                return Err(failure);
            }
        };
        self.run(&request, reporter)
    }

    pub fn run(
        &self,
        request: &MigrationRequest,
        reporter: &dyn StatusReporter,
    ) -> Result<RunOutcome, RunFailure> {
        debug!("{} migrations requested", request.len());
        reporter.report(&RunStatus::Connecting);
        let result = self
            .connector
            .connect()
            .map_err(RunFailure::from)
            .and_then(|handle| {
                let result = self.run_with(&handle, request, reporter);
                fold_close(result, handle.close())
            });

        match &result {
            Ok(outcome) => {
                info!("{}", outcome.summary);
                reporter.report(&RunStatus::Succeeded {
                    summary: outcome.summary.clone(),
                });
            }
            Err(failure) => reporter.report(&RunStatus::Failed {
                message: failure.to_string(),
            }),
        }
        result
    }

    /// Every ledger entry, creating the ledger table if needed.
    pub fn ledger_entries(&self) -> migrun_common::Result<Vec<LedgerEntry>> {
        let handle = self.connector.connect()?;
        let entries =
            LedgerStore::new(handle.connection(), &self.ledger_table).and_then(|ledger| {
                ledger.ensure_ready()?;
                ledger.entries()
            });
        match (entries, handle.close()) {
            (Ok(entries), Ok(())) => Ok(entries),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("failed to close database connection: {close_err}");
                }
                Err(e)
            }
        }
    }

    fn run_with(
        &self,
        handle: &DbHandle,
        request: &MigrationRequest,
        reporter: &dyn StatusReporter,
    ) -> Result<RunOutcome, RunFailure> {
        let ledger = LedgerStore::new(handle.connection(), &self.ledger_table)?;
        ledger.ensure_ready()?;
        let applied_names = ledger.load_applied_names()?;
        let batch = ledger.next_batch_number()?;

        let plan = planner::plan(request.migrations(), &applied_names);
        let applied = applier::apply(handle, &ledger, &plan.pending, batch, reporter)?;

        Ok(RunOutcome::new(applied, plan.skipped, batch))
    }
}

/// Fold the result of closing the handle into the run result. An earlier
/// failure takes precedence over a close failure.
fn fold_close(
    result: Result<RunOutcome, RunFailure>,
    closed: migrun_common::Result<()>,
) -> Result<RunOutcome, RunFailure> {
    match (result, closed) {
        (result, Ok(())) => result,
        (Ok(outcome), Err(e)) => Err(RunFailure::new(e, outcome.applied)),
        (Err(failure), Err(e)) => {
            warn!("failed to close database connection: {e}");
            Err(failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::SqliteConnector;
    use crate::status::TracingReporter;
    use migrun_config::DatabaseConfig;
    use serde_json::json;

    fn runner(dir: &tempfile::TempDir) -> MigrationRunner<SqliteConnector> {
        let config = DatabaseConfig::at(dir.path().join("app.db"));
        MigrationRunner::new(SqliteConnector::new(config), "_migrations").unwrap()
    }

    #[test]
    fn summary_counts_applied_and_skipped() {
        let outcome = RunOutcome::new(vec!["a".into(), "b".into()], 3, 2);
        assert_eq!(outcome.summary, "Applied 2, skipped 3.");
    }

    #[test]
    fn outcome_serializes_to_payload_shape() {
        let outcome = RunOutcome::new(vec!["b".into()], 1, 2);
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({"summary": "Applied 1, skipped 1.", "applied": ["b"], "skipped": 1, "batch": 2})
        );
    }

    #[test]
    fn close_failure_after_success_keeps_applied_list() {
        let outcome = RunOutcome::new(vec!["a".into(), "b".into()], 0, 1);
        let closed = Err(Error::Storage("failed to close database: busy".into()));

        let failure = fold_close(Ok(outcome), closed).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Storage);
        assert_eq!(failure.applied, ["a", "b"]);
    }

    #[test]
    fn earlier_failure_wins_over_close_failure() {
        let failure = RunFailure::new(
            Error::Execution {
                migration: "bad".into(),
                message: "syntax error".into(),
            },
            vec!["a".into()],
        );
        let closed = Err(Error::Storage("failed to close database: busy".into()));

        let failure = fold_close(Err(failure), closed).unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Execution);
        assert_eq!(failure.applied, ["a"]);
    }

    #[test]
    fn rejects_invalid_ledger_table_name() {
        let config = DatabaseConfig::at(":memory:");
        let result = MigrationRunner::new(SqliteConnector::new(config), "bad name");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn empty_request_still_creates_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);

        let outcome = runner
            .run_value(&json!({"migrations": []}), &TracingReporter)
            .unwrap();
        assert_eq!(outcome.summary, "Applied 0, skipped 0.");
        assert_eq!(outcome.batch, 1);
        assert!(runner.ledger_entries().unwrap().is_empty());
    }

    #[test]
    fn ledger_entries_lists_recorded_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        runner
            .run_value(
                &json!({"migrations": [{"name": "a", "up": "CREATE TABLE t(x int)"}]}),
                &TracingReporter,
            )
            .unwrap();

        let entries = runner.ledger_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[0].batch, 1);
    }
}
