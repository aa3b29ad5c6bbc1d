use std::fmt;

use tokio::sync::watch;
use tracing::{debug, warn};

const STATUS_NAME_LEN: usize = 20;

/// Progress of a run, published as it happens. Purely observational.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Connecting,
    Applying {
        name: String,
    },
    Succeeded {
        summary: String,
    },
    Failed {
        message: String,
    },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Idle => f.write_str(""),
            RunStatus::Connecting => f.write_str("Connecting..."),
            RunStatus::Applying { name } => {
                let short: String = name.chars().take(STATUS_NAME_LEN).collect();
                write!(f, "Applying: {short}...")
            }
            RunStatus::Succeeded { summary } => f.write_str(summary),
            RunStatus::Failed { .. } => f.write_str("Error"),
        }
    }
}

/// Receives status updates during a run.
pub trait StatusReporter {
    fn report(&self, status: &RunStatus);
}

/// Logs every status change.
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn report(&self, status: &RunStatus) {
        match status {
            RunStatus::Failed { message } => warn!("run failed: {message}"),
            other => debug!("status: {other}"),
        }
    }
}

/// Publishes the latest status to async observers. Works with no receivers.
impl StatusReporter for watch::Sender<RunStatus> {
    fn report(&self, status: &RunStatus) {
        self.send_replace(status.clone());
    }
}
