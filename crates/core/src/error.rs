//! Lifecycle error taxonomy.
//!
//! Every public operation of the engine returns [`LifecycleError`]:
//! - `StateTransition` - illegal FSM transition (user-facing, recoverable)
//! - `Validation` - bad input (e.g. a non-positive repayment amount)
//! - `NotFound` - unknown id
//! - `Persistence` - store failure, surfaced as an internal error and never
//!   retried inside the core

use parcela_shared::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::fsm::TransitionError;
use crate::ledger::LedgerError;
use crate::ports::StoreError;
use crate::schedule::ScheduleError;

/// Errors returned by the lifecycle engine.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Illegal state transition.
    #[error(transparent)]
    StateTransition(#[from] TransitionError),

    /// Invalid input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind.
        entity: &'static str,
        /// The requested id.
        id: Uuid,
    },

    /// Store failure.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl LifecycleError {
    /// Shorthand for a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<Uuid>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::StateTransition(_) | Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Persistence(StoreError::Conflict(_)) => 409,
            Self::Persistence(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::StateTransition(e) => e.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Persistence(StoreError::Conflict(_)) => "CONCURRENT_MODIFICATION",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

impl From<LedgerError> for LifecycleError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Store(e) => Self::Persistence(e),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<ScheduleError> for LifecycleError {
    fn from(err: ScheduleError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::StateTransition(e) => Self::StateTransition(e.to_string()),
            LifecycleError::Validation(msg) => Self::Validation(msg),
            e @ LifecycleError::NotFound { .. } => Self::NotFound(e.to_string()),
            LifecycleError::Persistence(StoreError::Conflict(id)) => {
                Self::Conflict(format!("contract {id} was modified concurrently"))
            }
            LifecycleError::Persistence(e) => Self::Database(e.to_string()),
        }
    }
}

/// Result alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
