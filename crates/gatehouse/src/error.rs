//! Engine error types.

use gatehouse_config::ConfigError;
use gatehouse_kernel::{StoreError, TransitionError};
use gatehouse_types::{VisitId, VisitorId};
use thiserror::Error;

/// Errors returned by the engine's operations.
///
/// Maps onto the error taxonomy:
/// - `VisitorNotFound` / `VisitNotFound`: caller error, no retry
/// - `Blacklisted`: security-relevant refusal, reason surfaced verbatim
/// - `InvalidValidity`: caller error on the issuance request
/// - `Transition`: business-rule conflict (second exit, exit without entry,
///   cancel after entry)
/// - `Store`: `StoreError::Unavailable` is transient and retryable; the rest
///   are data errors
/// - `Config`: rejected at engine construction, never mid-operation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("visitor {0} not found")]
    VisitorNotFound(VisitorId),

    #[error("visit {0} not found")]
    VisitNotFound(VisitId),

    #[error("visitor blocked: {reason}")]
    Blacklisted { reason: String },

    #[error("validity_hours must be greater than zero")]
    InvalidValidity,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
