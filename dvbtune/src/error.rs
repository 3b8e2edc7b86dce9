//! Error types for tuner sessions.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::control::Command;

/// Errors surfaced while opening, driving or closing a tuning session.
#[derive(Error, Debug)]
pub enum TunerError {
    /// A device node could not be opened (missing node, permission denied, ...).
    #[error("Failed to open {}: {source}", .path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The driver rejected a control command.
    #[error("{command} failed: {source}")]
    ControlCommand {
        command: Command,
        #[source]
        source: io::Error,
    },

    /// The driver reported a timeout while waiting for the frontend to settle.
    #[error("Tuner timed out while tuning to {requested}")]
    TuneTimeout { requested: u32 },

    /// No frontend event became pending within the configured lock timeout.
    /// The driver itself never reported anything.
    #[error("No frontend event within {timeout:?} while tuning to {requested}")]
    EventWaitExpired { requested: u32, timeout: Duration },

    /// The driver settled on a different frequency than the one requested.
    #[error("Failed to tune to {requested}, tuner at {actual}")]
    TuneMismatch { requested: u32, actual: u32 },

    /// One or more handles failed to close. Holds one message per failed handle.
    #[error("{}", .failures.join("; "))]
    CloseAggregate { failures: Vec<String> },

    /// An open sequence failed and some of the handles it had already opened
    /// then failed to close.
    #[error("{source} (rollback: {})", .failures.join("; "))]
    Rollback {
        #[source]
        source: Box<TunerError>,
        failures: Vec<String>,
    },
}

impl TunerError {
    /// OS error code carried by the error, if any.
    pub fn os_error(&self) -> Option<i32> {
        match self.primary() {
            TunerError::DeviceOpen { source, .. } | TunerError::ControlCommand { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// The error that aborted the operation, looking through [`TunerError::Rollback`].
    pub fn primary(&self) -> &TunerError {
        match self {
            TunerError::Rollback { source, .. } => source.primary(),
            other => other,
        }
    }

    /// Attach close failures from a rollback. Failures accumulate on an
    /// existing [`TunerError::Rollback`] instead of nesting.
    pub fn with_rollback(self, mut failures: Vec<String>) -> TunerError {
        if failures.is_empty() {
            return self;
        }
        match self {
            TunerError::Rollback {
                source,
                failures: mut earlier,
            } => {
                earlier.append(&mut failures);
                TunerError::Rollback {
                    source,
                    failures: earlier,
                }
            }
            other => TunerError::Rollback {
                source: Box::new(other),
                failures,
            },
        }
    }
}
