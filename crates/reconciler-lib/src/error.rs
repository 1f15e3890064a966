//! Error taxonomy for the reconciler
//!
//! Only bootstrap failures are fatal. Everything raised while the loop is
//! running is logged and the loop carries on.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Telemetry file missing or unreadable
    #[error("failed to read telemetry file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Telemetry file present but not schema-conformant
    #[error("malformed telemetry in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to open metrics store at {path}: {source}")]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to write {table}: {source}")]
    StoreWrite {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("metrics store is closed")]
    StoreClosed,

    /// No running container has the requested root pid
    #[error("no running container found for pid {0}")]
    LocatorNotFound(u32),

    #[error("`{command}` failed: {detail}")]
    ExternalCommand { command: String, detail: String },

    #[error("required script not found: {}", .0.display())]
    ScriptMissing(PathBuf),
}

impl ReconcileError {
    pub fn external(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ExternalCommand {
            command: command.into(),
            detail: detail.into(),
        }
    }

    /// Errors that must stop the daemon before the loop starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreOpen { .. } | Self::ScriptMissing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ReconcileError::ScriptMissing(PathBuf::from("/x.sh")).is_fatal());
        assert!(!ReconcileError::LocatorNotFound(42).is_fatal());
        assert!(!ReconcileError::external("docker ps", "exit 1").is_fatal());
        assert!(!ReconcileError::StoreClosed.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = ReconcileError::LocatorNotFound(1234);
        assert_eq!(err.to_string(), "no running container found for pid 1234");

        let err = ReconcileError::external("docker stop abc", "exit status 1");
        assert_eq!(err.to_string(), "`docker stop abc` failed: exit status 1");
    }
}
