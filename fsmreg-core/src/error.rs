//! Core error types.

use thiserror::Error;

/// Errors from automaton construction and registry access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid automaton definition: {reason}")]
    InvalidDefinition { reason: String },

    #[error("invalid state {state}: automaton has {states} state(s)")]
    InvalidState { state: usize, states: usize },

    #[error("unknown definition id: {id}")]
    UnknownDefinition { id: u64 },
}

impl CoreError {
    pub(crate) fn invalid_definition(reason: impl Into<String>) -> Self {
        CoreError::InvalidDefinition {
            reason: reason.into(),
        }
    }

    /// Returns an error code suitable for logs and persisted diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidDefinition { .. } => "INVALID_DEFINITION",
            CoreError::InvalidState { .. } => "INVALID_STATE",
            CoreError::UnknownDefinition { .. } => "UNKNOWN_DEFINITION",
        }
    }
}
