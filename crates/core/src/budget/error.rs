//! Budget error types.

use rust_decimal::Decimal;
use thiserror::Error;
use fundbook_shared::types::{AccountId, BudgetItemId};

use super::types::{BudgetAction, BudgetStatus};

/// Budget-related errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    /// Status transition refused.
    #[error("cannot {action} a budget in status {from}")]
    InvalidStatus {
        /// Current status.
        from: BudgetStatus,
        /// Refused action.
        action: BudgetAction,
    },

    /// Revisions are not accepted in the current status.
    #[error("budget in status {0} cannot be revised")]
    RevisionNotAllowed(BudgetStatus),

    /// Budget name is blank.
    #[error("budget name cannot be empty")]
    EmptyName,

    /// Change-set is empty.
    #[error("revision must contain at least one change")]
    EmptyChangeSet,

    /// Account not found.
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Item not found on the budget.
    #[error("budget item not found: {0}")]
    ItemNotFound(BudgetItemId),

    /// Item was removed earlier in the same change-set.
    #[error("budget item {0} was removed earlier in this revision")]
    ItemRemoved(BudgetItemId),

    /// Amount is negative, zero where positive is required, or finer than a cent.
    #[error("invalid budget amount: {0}")]
    InvalidAmount(Decimal),

    /// Distribution has the wrong number of slots.
    #[error("distribution has {actual} periods, expected {expected}")]
    DistributionLength {
        /// Slots required by the period type.
        expected: usize,
        /// Slots supplied.
        actual: usize,
    },

    /// Distribution does not sum to the item amount.
    #[error("distribution sums to {distributed}, expected {amount}")]
    DistributionMismatch {
        /// Item amount.
        amount: Decimal,
        /// Sum of the distribution.
        distributed: Decimal,
    },

    /// Distribution slot out of range.
    #[error("budget period {period} is out of range 1..={slots}")]
    PeriodOutOfRange {
        /// Requested 1-based period.
        period: usize,
        /// Number of slots.
        slots: usize,
    },

    /// Variance arithmetic left the representable decimal range.
    #[error("budget variance is out of the representable range")]
    VarianceOverflow,
}

impl BudgetError {
    /// Returns the error code for outer layers.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidStatus { .. } => "INVALID_BUDGET_STATUS",
            Self::RevisionNotAllowed(_) => "BUDGET_LOCKED",
            Self::EmptyName => "EMPTY_BUDGET_NAME",
            Self::EmptyChangeSet => "EMPTY_CHANGE_SET",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::ItemNotFound(_) => "BUDGET_ITEM_NOT_FOUND",
            Self::ItemRemoved(_) => "BUDGET_ITEM_REMOVED",
            Self::InvalidAmount(_) => "INVALID_BUDGET_AMOUNT",
            Self::DistributionLength { .. } => "DISTRIBUTION_LENGTH",
            Self::DistributionMismatch { .. } => "DISTRIBUTION_MISMATCH",
            Self::PeriodOutOfRange { .. } => "PERIOD_OUT_OF_RANGE",
            Self::VarianceOverflow => "VARIANCE_OUT_OF_RANGE",
        }
    }

    /// Returns true for lifecycle errors, as opposed to bad input.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::InvalidStatus { .. } | Self::RevisionNotAllowed(_))
    }
}
