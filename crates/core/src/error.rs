//! Error taxonomy shared by every service in the crate.

use std::fmt;

use thiserror::Error;
use fundbook_shared::AppError;

use crate::balance::BalanceMismatch;
use crate::budget::BudgetError;
use crate::guard::LockTimeout;
use crate::ledger::ValidationError;
use crate::repository::StoreError;
use crate::workflow::InvalidTransition;

/// Broad class of a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Input rejected before any mutation.
    Validation,
    /// Operation not allowed in the entity's current status.
    InvalidState,
    /// Lost a race; retry with fresh state.
    Concurrency,
    /// Derived data disagrees with the posted log.
    Consistency,
    /// Entity does not exist.
    NotFound,
    /// Persistence failure.
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::InvalidState => "invalid_state",
            Self::Concurrency => "concurrency",
            Self::Consistency => "consistency",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input failed a ledger rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Budget input or lifecycle error.
    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// Illegal transaction status transition.
    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),

    /// Another caller is mutating the same entity, a version check failed,
    /// or a lock could not be acquired in time.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Stored balances disagree with the posted-entry log.
    #[error("{} balance bucket(s) disagree with the posted log", mismatches.len())]
    Consistency {
        /// Every bucket that disagreed.
        mismatches: Vec<BalanceMismatch>,
    },

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Entity ID.
        id: String,
    },

    /// Persistence failure.
    #[error(transparent)]
    Storage(StoreError),
}

impl LedgerError {
    /// A not-found error for `entity`.
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the broad class of the error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Budget(err) if err.is_state_error() => ErrorCategory::InvalidState,
            Self::Budget(_) => ErrorCategory::Validation,
            Self::InvalidState(_) => ErrorCategory::InvalidState,
            Self::ConcurrentModification(_) => ErrorCategory::Concurrency,
            Self::Consistency { .. } => ErrorCategory::Consistency,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Returns the error code for outer layers.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.error_code(),
            Self::Budget(err) => err.error_code(),
            Self::InvalidState(_) => "INVALID_TRANSITION",
            Self::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            Self::Consistency { .. } => "BALANCE_MISMATCH",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { .. } | StoreError::Duplicate { .. } => {
                Self::ConcurrentModification(err.to_string())
            }
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Backend(_) => Self::Storage(err),
        }
    }
}

impl From<LockTimeout> for LedgerError {
    fn from(err: LockTimeout) -> Self {
        Self::ConcurrentModification(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err.category() {
            ErrorCategory::Validation => Self::Validation(message),
            ErrorCategory::InvalidState => Self::InvalidState(message),
            ErrorCategory::Concurrency => Self::Conflict(message),
            ErrorCategory::Consistency => Self::Consistency(message),
            ErrorCategory::NotFound => Self::NotFound(message),
            ErrorCategory::Storage => Self::Storage(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetAction, BudgetStatus};
    use crate::workflow::{TransactionStatus, WorkflowAction};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[test]
    fn test_error_codes() {
        let err = LedgerError::from(ValidationError::Unbalanced {
            debit: dec!(100),
            credit: dec!(50),
        });
        assert_eq!(err.error_code(), "UNBALANCED_TRANSACTION");
        assert_eq!(err.category(), ErrorCategory::Validation);

        let err = LedgerError::from(InvalidTransition {
            from: TransactionStatus::Voided,
            action: WorkflowAction::Approve,
        });
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(err.category(), ErrorCategory::InvalidState);
    }

    #[test]
    fn test_budget_errors_split_by_category() {
        let state = LedgerError::from(BudgetError::InvalidStatus {
            from: BudgetStatus::Closed,
            action: BudgetAction::Submit,
        });
        assert_eq!(state.category(), ErrorCategory::InvalidState);

        let input = LedgerError::from(BudgetError::EmptyChangeSet);
        assert_eq!(input.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_store_conflicts_become_concurrent_modification() {
        let err = LedgerError::from(StoreError::VersionConflict {
            entity: "transaction",
            id: "t1".to_string(),
            expected: 2,
            actual: 3,
        });
        assert!(matches!(err, LedgerError::ConcurrentModification(_)));
        assert!(err.is_retryable());

        let err = LedgerError::from(StoreError::Backend("disk full".to_string()));
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = LedgerError::from(LockTimeout(Duration::from_millis(5)));
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "CONCURRENT_MODIFICATION");
    }

    #[test]
    fn test_app_error_mapping() {
        let app: AppError = LedgerError::from(ValidationError::NoEntries).into();
        assert_eq!(app.status_code(), 400);

        let app: AppError = LedgerError::not_found("transaction", "abc").into();
        assert_eq!(app.status_code(), 404);
        assert_eq!(app.to_string(), "Not found: transaction not found: abc");

        let app: AppError = LedgerError::ConcurrentModification("busy".to_string()).into();
        assert_eq!(app.status_code(), 409);
        assert!(app.is_retryable());

        let app: AppError = LedgerError::Consistency { mismatches: vec![] }.into();
        assert_eq!(app.error_code(), "CONSISTENCY_ERROR");
    }
}
