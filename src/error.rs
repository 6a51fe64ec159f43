//! Worker error types.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors that stop a worker run.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("core error: {0}")]
    Core(#[from] fsmreg_core::CoreError),

    #[error("persistence error: {0}")]
    Persist(#[from] fsmreg_persist::PersistError),
}

impl WorkerError {
    /// Returns an error code suitable for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            WorkerError::Config(_) => "BAD_CONFIG",
            WorkerError::Core(e) => e.error_code(),
            WorkerError::Persist(e) => e.error_code(),
        }
    }
}
