//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Business-rule failures raised by aggregates and pure domain functions.
///
/// Storage failures live in `forgepos_infra::event_store::EventStoreError`;
/// permission checks in `forgepos_auth::AuthzError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input: blank SKU, negative price, wrong sign for an adjustment type.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command is well-formed but the current state forbids it
    /// (insufficient stock, inactive product, suspended party).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The aggregate the command targets was never created.
    #[error("not found")]
    NotFound,

    /// Duplicate creation or a state transition that already happened.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
