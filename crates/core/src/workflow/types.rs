//! Workflow domain types for transaction lifecycle management.
//!
//! This module defines the transaction status state machine. Every status
//! change in the crate goes through [`TransactionStatus::transition`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Transaction status in the posting lifecycle.
///
/// The valid transitions are:
/// - Draft → Draft (edit)
/// - Draft → PendingApproval (submit)
/// - Draft | PendingApproval → Approved (approve)
/// - PendingApproval | Approved → Draft (reject)
/// - Approved → Posted (post)
/// - Posted | PartiallyPaid → PartiallyPaid | Paid (record payment)
/// - any status except Paid and Voided → Voided (void)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Transaction is being drafted and can be modified.
    Draft,
    /// Transaction has been submitted for approval.
    PendingApproval,
    /// Transaction has been approved and is ready for posting.
    Approved,
    /// Transaction has been posted to the ledger.
    Posted,
    /// Some, but not all, of the amount due has been paid.
    PartiallyPaid,
    /// The amount due has been paid in full.
    Paid,
    /// Transaction has been voided.
    Voided,
}

impl TransactionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingApproval => "PENDING_APPROVAL",
            Self::Approved => "APPROVED",
            Self::Posted => "POSTED",
            Self::PartiallyPaid => "PARTIALLY_PAID",
            Self::Paid => "PAID",
            Self::Voided => "VOIDED",
        }
    }

    /// Returns true if the entries may still be edited.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Returns true if the transaction's entries count toward balances.
    #[must_use]
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Posted | Self::PartiallyPaid | Self::Paid)
    }

    /// Applies `action` to this status.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if `action` is not allowed from this status.
    pub fn transition(self, action: WorkflowAction) -> Result<Self, InvalidTransition> {
        use TransactionStatus::{Approved, Draft, Paid, PartiallyPaid, PendingApproval, Posted, Voided};

        let next = match (self, action) {
            (Draft, WorkflowAction::Edit) => Some(Draft),
            (Draft, WorkflowAction::Submit) => Some(PendingApproval),
            (Draft | PendingApproval, WorkflowAction::Approve) => Some(Approved),
            (PendingApproval | Approved, WorkflowAction::Reject) => Some(Draft),
            (Approved, WorkflowAction::Post) => Some(Posted),
            (Posted | PartiallyPaid, WorkflowAction::RecordPayment { settled: true }) => Some(Paid),
            (Posted | PartiallyPaid, WorkflowAction::RecordPayment { settled: false }) => {
                Some(PartiallyPaid)
            }
            (Draft | PendingApproval | Approved | Posted | PartiallyPaid, WorkflowAction::Void) => {
                Some(Voided)
            }
            _ => None,
        };

        next.ok_or(InvalidTransition { from: self, action })
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An action that moves a transaction between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    /// Replace the lines or description of a draft.
    Edit,
    /// Submit a draft for approval.
    Submit,
    /// Approve a draft or pending transaction.
    Approve,
    /// Send a pending or approved transaction back to draft.
    Reject,
    /// Post an approved transaction to the ledger.
    Post,
    /// Record a payment against a bill or invoice.
    RecordPayment {
        /// Whether the payment settles the amount due in full.
        settled: bool,
    },
    /// Void the transaction.
    Void,
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Edit => "edit",
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Post => "post",
            Self::RecordPayment { .. } => "record payment on",
            Self::Void => "void",
        };
        f.write_str(name)
    }
}

/// An action was attempted from a status that does not allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a transaction in status {from}")]
pub struct InvalidTransition {
    /// Status the transaction was in.
    pub from: TransactionStatus,
    /// Action that was refused.
    pub action: WorkflowAction,
}
