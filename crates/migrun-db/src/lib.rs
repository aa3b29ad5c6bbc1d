pub mod applier;
pub mod handle;
pub mod ledger;
pub mod migrations;
pub mod planner;
pub mod runner;
pub mod status;

pub use handle::{Connector, DbHandle, SqliteConnector};
pub use ledger::{LedgerEntry, LedgerStore};
pub use migrations::{Migration, MigrationRequest};
pub use planner::Plan;
pub use runner::{MigrationRunner, RunFailure, RunOutcome};
pub use status::{RunStatus, StatusReporter, TracingReporter};
