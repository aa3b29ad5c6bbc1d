use chrono::Utc;
use migrun_common::Error;
use tracing::{error, info};

use crate::handle::DbHandle;
use crate::ledger::LedgerStore;
use crate::migrations::Migration;
use crate::runner::RunFailure;
use crate::status::{RunStatus, StatusReporter};

/// Apply `pending` one at a time. Each body runs in its own transaction
/// together with its ledger row, so a migration is either fully applied and
/// recorded or leaves no trace.
///
/// The first failure stops the run. Migrations committed before it stay
/// recorded and are carried in the returned [`RunFailure`].
pub fn apply(
    handle: &DbHandle,
    ledger: &LedgerStore<'_>,
    pending: &[&Migration],
    batch: i64,
    reporter: &dyn StatusReporter,
) -> Result<Vec<String>, RunFailure> {
    let mut applied = Vec::with_capacity(pending.len());

    for migration in pending {
        info!("applying migration: {}", migration.name);
        reporter.report(&RunStatus::Applying {
            name: migration.name.clone(),
        });

        if let Err(e) = apply_one(handle, ledger, migration, batch) {
            error!("migration {} failed: {e}", migration.name);
            return Err(RunFailure::new(e, applied));
        }

        applied.push(migration.name.clone());
    }

    Ok(applied)
}

fn apply_one(
    handle: &DbHandle,
    ledger: &LedgerStore<'_>,
    migration: &Migration,
    batch: i64,
) -> migrun_common::Result<()> {
    let tx = handle.begin()?;

    handle
        .execute_raw(&migration.up)
        .map_err(|e| Error::Execution {
            migration: migration.name.clone(),
            message: e.to_string(),
        })?;
    ledger.record(&migration.name, batch, Utc::now())?;

    tx.commit().map_err(|e| {
        Error::Storage(format!("failed to commit migration {}: {e}", migration.name))
    })
}
