//! Persistence error types.

use thiserror::Error;

/// Errors from persisting and restoring automaton state.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("restore failed: {reason}")]
    Restore { reason: String },

    #[error("core error: {0}")]
    Core(#[from] fsmreg_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("invalid snapshot name: {0:?}")]
    InvalidName(String),

    #[error("data corruption: {0}")]
    Corruption(String),
}

impl PersistError {
    pub(crate) fn restore(reason: impl Into<String>) -> Self {
        PersistError::Restore {
            reason: reason.into(),
        }
    }

    /// Returns true if the caller may treat the failure as "no prior state"
    /// and start from a fresh automaton.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PersistError::Restore { .. }
                | PersistError::Core(_)
                | PersistError::SnapshotNotFound(_)
                | PersistError::Corruption(_)
        )
    }

    /// Returns an error code suitable for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            PersistError::Restore { .. } => "RESTORE_ERROR",
            PersistError::Core(e) => e.error_code(),
            PersistError::Io(_) => "IO_ERROR",
            PersistError::Json(_) => "MALFORMED_RECORD",
            PersistError::SnapshotNotFound(_) => "SNAPSHOT_NOT_FOUND",
            PersistError::InvalidName(_) => "BAD_REQUEST",
            PersistError::Corruption(_) => "CORRUPTION",
        }
    }
}
