//! Domain error kinds.
//!
//! One enum covers the whole control plane; each variant maps to exactly
//! one HTTP status in the API layer. Storage failures abort the mutation
//! before any in-memory state is touched.

use thiserror::Error;

/// Errors surfaced by dispatcher, store, and AI pipeline operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed payload, missing required field, unknown enum value,
    /// or failed path validation.
    #[error("{0}")]
    InvalidInput(String),

    /// A state-machine precondition was violated: ownership mismatch,
    /// terminal-state mutation, drained agent pulling, exhausted budget.
    #[error("{0}")]
    Conflict(String),

    /// Unknown task or agent id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Path outside the allow-list.
    #[error("{0}")]
    Forbidden(String),

    /// Feature switched off by configuration.
    #[error("{0}")]
    Disabled(String),

    /// Persistence failure. The in-memory map was not updated.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_the_resource() {
        let err = DomainError::not_found("task", "tsk-000042");
        assert_eq!(err.to_string(), "task not found: tsk-000042");
    }

    #[test]
    fn storage_wraps_sqlx_errors() {
        let err: DomainError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DomainError::Storage(_)));
    }
}
