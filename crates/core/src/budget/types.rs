//! Budget data types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use fundbook_shared::types::{
    AccountId, BudgetId, BudgetItemId, BudgetRevisionId, FiscalYearId, FundId, UserId,
};

use super::error::BudgetError;

/// Granularity of a budget's period distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodType {
    /// Twelve slots.
    Monthly,
    /// Four slots.
    Quarterly,
    /// One slot.
    Annual,
}

impl PeriodType {
    /// Number of distribution slots per fiscal year.
    #[must_use]
    pub fn slots(self) -> usize {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::Annual => 1,
        }
    }
}

/// Budget lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    /// Being prepared.
    Draft,
    /// Awaiting approval.
    PendingApproval,
    /// Approved, not yet in effect.
    Approved,
    /// In effect.
    Active,
    /// Finished; read-only.
    Closed,
    /// Sent back by the approver.
    Rejected,
}

/// An action that moves a budget between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAction {
    /// Draft → PendingApproval.
    Submit,
    /// PendingApproval → Approved.
    Approve,
    /// PendingApproval → Rejected.
    Reject,
    /// Rejected → Draft.
    Reopen,
    /// Approved → Active.
    Activate,
    /// Active → Closed.
    Close,
}

impl BudgetStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Active => "ACTIVE",
            Self::Closed => "CLOSED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Applies `action` to this status.
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::InvalidStatus`] if the action is not allowed.
    pub fn transition(self, action: BudgetAction) -> Result<Self, BudgetError> {
        let next = match (self, action) {
            (Self::Draft, BudgetAction::Submit) => Self::PendingApproval,
            (Self::PendingApproval, BudgetAction::Approve) => Self::Approved,
            (Self::PendingApproval, BudgetAction::Reject) => Self::Rejected,
            (Self::Rejected, BudgetAction::Reopen) => Self::Draft,
            (Self::Approved, BudgetAction::Activate) => Self::Active,
            (Self::Active, BudgetAction::Close) => Self::Closed,
            _ => return Err(BudgetError::InvalidStatus { from: self, action }),
        };
        Ok(next)
    }

    /// Returns true if revisions may be applied in this status.
    #[must_use]
    pub fn accepts_revisions(self) -> bool {
        !matches!(self, Self::PendingApproval | Self::Closed)
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BudgetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Reopen => "reopen",
            Self::Activate => "activate",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// A budget line item.
///
/// `period_distribution` always has one slot per budget period and sums to
/// `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetItem {
    /// Item ID.
    pub id: BudgetItemId,
    /// Budgeted account.
    pub account_id: AccountId,
    /// Budgeted amount for the year.
    pub amount: Decimal,
    /// Per-period amounts.
    pub period_distribution: Vec<Decimal>,
    /// Optional notes.
    pub notes: Option<String>,
}

/// A budget for one fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Budget ID.
    pub id: BudgetId,
    /// Budget name.
    pub name: String,
    /// Fiscal year ID.
    pub fiscal_year_id: FiscalYearId,
    /// Fund the budget is restricted to, if any.
    pub fund_id: Option<FundId>,
    /// Distribution granularity.
    pub period_type: PeriodType,
    /// Lifecycle status.
    pub status: BudgetStatus,
    /// Line items.
    #[serde(default)]
    pub items: Vec<BudgetItem>,
    /// Sum of item amounts.
    pub total_amount: Decimal,
    /// Optimistic concurrency counter.
    pub version: u64,
    /// Number of revisions applied.
    pub revision_number: u32,
    /// User who created the budget.
    pub created_by: UserId,
    /// Approving user.
    pub approved_by: Option<UserId>,
    /// Approval time.
    pub approved_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Finds an item by ID.
    #[must_use]
    pub fn item(&self, id: BudgetItemId) -> Option<&BudgetItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Sum of item amounts.
    #[must_use]
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(|item| item.amount).sum()
    }
}

/// One change in a revision change-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetChange {
    /// Add a new item.
    Add {
        /// Budgeted account.
        account_id: AccountId,
        /// Amount, must be positive.
        amount: Decimal,
        /// Explicit distribution; spread evenly when absent.
        distribution: Option<Vec<Decimal>>,
        /// Optional notes.
        notes: Option<String>,
    },
    /// Change an existing item.
    Modify {
        /// Item to change.
        item_id: BudgetItemId,
        /// New amount; unchanged when absent.
        amount: Option<Decimal>,
        /// New distribution; re-spread when absent and the amount changed.
        distribution: Option<Vec<Decimal>>,
        /// New notes; unchanged when absent.
        notes: Option<String>,
    },
    /// Remove an existing item.
    Remove {
        /// Item to remove.
        item_id: BudgetItemId,
    },
}

/// The effect one change had, as recorded in the revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppliedChange {
    /// An item was added.
    Add {
        /// The new item.
        item: BudgetItem,
    },
    /// An item was changed.
    Modify {
        /// Item before the change.
        before: BudgetItem,
        /// Item after the change.
        after: BudgetItem,
    },
    /// An item was removed.
    Remove {
        /// The removed item.
        item: BudgetItem,
    },
}

/// Immutable record of one applied change-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRevision {
    /// Revision ID.
    pub id: BudgetRevisionId,
    /// Revised budget.
    pub budget_id: BudgetId,
    /// Sequence number within the budget, starting at 1.
    pub revision_number: u32,
    /// Changes applied, in order.
    pub changes: Vec<AppliedChange>,
    /// Budget total before the revision.
    pub previous_total: Decimal,
    /// Budget total after the revision.
    pub new_total: Decimal,
    /// Optional reason.
    pub reason: Option<String>,
    /// Revising user.
    pub revised_by: UserId,
    /// Revision time.
    pub revised_at: DateTime<Utc>,
}

/// Input for one item of a new budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBudgetItem {
    /// Budgeted account.
    pub account_id: AccountId,
    /// Amount.
    pub amount: Decimal,
    /// Explicit distribution; spread evenly when absent.
    pub distribution: Option<Vec<Decimal>>,
    /// Optional notes.
    pub notes: Option<String>,
}

/// Input for creating a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBudget {
    /// Budget name.
    pub name: String,
    /// Fiscal year.
    pub fiscal_year_id: FiscalYearId,
    /// Restricting fund.
    pub fund_id: Option<FundId>,
    /// Distribution granularity.
    pub period_type: PeriodType,
    /// Initial items.
    pub items: Vec<NewBudgetItem>,
    /// Creating user.
    pub created_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(BudgetStatus::Draft, BudgetAction::Submit, BudgetStatus::PendingApproval)]
    #[case(BudgetStatus::PendingApproval, BudgetAction::Approve, BudgetStatus::Approved)]
    #[case(BudgetStatus::PendingApproval, BudgetAction::Reject, BudgetStatus::Rejected)]
    #[case(BudgetStatus::Rejected, BudgetAction::Reopen, BudgetStatus::Draft)]
    #[case(BudgetStatus::Approved, BudgetAction::Activate, BudgetStatus::Active)]
    #[case(BudgetStatus::Active, BudgetAction::Close, BudgetStatus::Closed)]
    fn test_budget_transitions(
        #[case] from: BudgetStatus,
        #[case] action: BudgetAction,
        #[case] to: BudgetStatus,
    ) {
        assert_eq!(from.transition(action).unwrap(), to);
    }

    #[rstest]
    #[case(BudgetStatus::Draft, BudgetAction::Approve)]
    #[case(BudgetStatus::Rejected, BudgetAction::Submit)]
    #[case(BudgetStatus::Closed, BudgetAction::Reopen)]
    #[case(BudgetStatus::Active, BudgetAction::Activate)]
    fn test_budget_refused_transitions(#[case] from: BudgetStatus, #[case] action: BudgetAction) {
        assert!(matches!(
            from.transition(action),
            Err(BudgetError::InvalidStatus { .. })
        ));
    }

    #[test]
    fn test_revision_gate() {
        assert!(BudgetStatus::Draft.accepts_revisions());
        assert!(BudgetStatus::Active.accepts_revisions());
        assert!(BudgetStatus::Rejected.accepts_revisions());
        assert!(!BudgetStatus::PendingApproval.accepts_revisions());
        assert!(!BudgetStatus::Closed.accepts_revisions());
    }

    #[test]
    fn test_period_type_slots() {
        assert_eq!(PeriodType::Monthly.slots(), 12);
        assert_eq!(PeriodType::Quarterly.slots(), 4);
        assert_eq!(PeriodType::Annual.slots(), 1);
    }
}
