//! Workflow service for transaction state transitions.
//!
//! Every mutating call claims the transaction id for its duration, so two
//! concurrent calls on the same transaction cannot both proceed. Writes are
//! additionally compare-and-swap on the transaction version.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};
use fundbook_shared::types::{PaymentId, TransactionId, UserId};

use crate::balance::{BalanceAggregator, Idempotent};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::guard::{Claim, ClaimSet};
use crate::ledger::validation::{is_positive_minor_unit, kind_label};
use crate::ledger::{
    validate_entries, validate_line_shape, validate_posting_period, ApprovalRecord, Counterparty,
    EntryInput, EntryTotals, NewSettlement, NewTransaction, Payment, Settlement, Transaction,
    TransactionKind, ValidationError, VoidRecord,
};
use crate::repository::{load_accounts, LedgerRepository, WriteBatch};
use crate::workflow::types::{TransactionStatus, WorkflowAction};

/// Drives transactions through their lifecycle.
pub struct TransactionWorkflow<R: LedgerRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    aggregator: Arc<BalanceAggregator<R>>,
    claims: ClaimSet<TransactionId>,
}

impl<R: LedgerRepository> TransactionWorkflow<R> {
    /// Create a new workflow service.
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>, aggregator: Arc<BalanceAggregator<R>>) -> Self {
        Self {
            repo,
            clock,
            aggregator,
            claims: ClaimSet::new(),
        }
    }

    /// Creates a draft.
    ///
    /// Lines must be well-formed but need not balance yet. Bills and invoices
    /// need settlement terms with a positive amount due.
    pub async fn create_draft(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        let period = self
            .repo
            .load_fiscal_period(input.fiscal_period_id)
            .await?
            .ok_or(ValidationError::FiscalPeriodNotFound(input.fiscal_period_id))?;
        let settlement = settlement_terms(input.kind, input.settlement)?;

        let now = self.clock.now();
        let mut transaction = Transaction {
            id: TransactionId::new(),
            kind: input.kind,
            transaction_date: input.transaction_date,
            description: input.description,
            status: TransactionStatus::Draft,
            fiscal_year_id: period.fiscal_year_id,
            fiscal_period_id: period.id,
            entries: Vec::new(),
            amount: Decimal::ZERO,
            settlement,
            version: 1,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            approval: None,
            posted_by: None,
            posted_at: None,
            void_record: None,
            rejection_reason: None,
        };
        transaction.replace_entries(&input.entries);
        validate_line_shape(&transaction.entries)?;

        self.repo.save_transaction(transaction.clone(), 0).await?;

        info!(
            transaction_id = %transaction.id,
            kind = transaction.kind.as_str(),
            lines = transaction.entries.len(),
            created_by = %transaction.created_by,
            "Draft created"
        );
        Ok(transaction)
    }

    /// Replaces the lines, and optionally the description, of a draft.
    pub async fn update_draft(
        &self,
        id: TransactionId,
        entries: Vec<EntryInput>,
        description: Option<String>,
    ) -> Result<Transaction, LedgerError> {
        let _claim = self.claim(id)?;
        let mut transaction = self.load(id).await?;
        transaction.status.transition(WorkflowAction::Edit)?;

        transaction.replace_entries(&entries);
        validate_line_shape(&transaction.entries)?;
        if let Some(description) = description {
            transaction.description = description;
        }

        let expected = self.bump(&mut transaction);
        self.repo.save_transaction(transaction.clone(), expected).await?;

        info!(transaction_id = %id, lines = transaction.entries.len(), "Draft updated");
        Ok(transaction)
    }

    /// Submits a draft for approval. The entries must validate.
    pub async fn submit_for_approval(
        &self,
        id: TransactionId,
        submitted_by: UserId,
    ) -> Result<Transaction, LedgerError> {
        let _claim = self.claim(id)?;
        let mut transaction = self.load(id).await?;
        let next = transaction.status.transition(WorkflowAction::Submit)?;
        self.validate(&transaction).await?;

        transaction.status = next;
        transaction.submitted_at = Some(self.clock.now());
        transaction.rejection_reason = None;

        let expected = self.bump(&mut transaction);
        self.repo.save_transaction(transaction.clone(), expected).await?;

        info!(transaction_id = %id, %submitted_by, "Transaction submitted for approval");
        Ok(transaction)
    }

    /// Approves a draft or pending transaction. The entries are re-validated.
    pub async fn approve(
        &self,
        id: TransactionId,
        approved_by: UserId,
    ) -> Result<Transaction, LedgerError> {
        let _claim = self.claim(id)?;
        let mut transaction = self.load(id).await?;
        let next = transaction.status.transition(WorkflowAction::Approve)?;
        self.validate(&transaction).await?;

        let now = self.clock.now();
        transaction.status = next;
        transaction.approval = Some(ApprovalRecord {
            approved_by,
            approved_at: now,
        });
        transaction.rejection_reason = None;

        let expected = self.bump(&mut transaction);
        self.repo.save_transaction(transaction.clone(), expected).await?;

        info!(transaction_id = %id, %approved_by, "Transaction approved");
        Ok(transaction)
    }

    /// Sends a pending or approved transaction back to draft.
    pub async fn reject(
        &self,
        id: TransactionId,
        reason: &str,
        rejected_by: UserId,
    ) -> Result<Transaction, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::RejectionReasonRequired.into());
        }

        let _claim = self.claim(id)?;
        let mut transaction = self.load(id).await?;
        transaction.status = transaction.status.transition(WorkflowAction::Reject)?;
        transaction.rejection_reason = Some(reason.to_string());
        transaction.approval = None;
        transaction.submitted_at = None;

        let expected = self.bump(&mut transaction);
        self.repo.save_transaction(transaction.clone(), expected).await?;

        info!(transaction_id = %id, %rejected_by, reason, "Transaction rejected");
        Ok(transaction)
    }

    /// Posts an approved transaction.
    ///
    /// Entries and the fiscal period are re-checked immediately before the
    /// status flips. The status change and the balance updates are committed
    /// together; on any failure the transaction stays approved.
    pub async fn post(&self, id: TransactionId, posted_by: UserId) -> Result<Transaction, LedgerError> {
        let _claim = self.claim(id)?;
        let mut transaction = self.load(id).await?;
        let next = transaction.status.transition(WorkflowAction::Post)?;

        if let Err(err) = self.check_postable(&transaction).await {
            warn!(transaction_id = %id, error = %err, "Posting rejected");
            return Err(err);
        }

        transaction.status = next;
        transaction.posted_by = Some(posted_by);
        transaction.posted_at = Some(self.clock.now());
        let expected = self.bump(&mut transaction);

        let batch = WriteBatch::transaction(transaction.clone(), expected);
        let outcome = self.aggregator.apply_posting_with(&transaction, batch).await?;
        if outcome.was_ignored() {
            // balances already carry this transaction; flip the status alone
            self.repo
                .commit(WriteBatch::transaction(transaction.clone(), expected))
                .await?;
        }

        info!(
            transaction_id = %id,
            %posted_by,
            amount = %transaction.amount,
            "Transaction posted"
        );
        Ok(transaction)
    }

    /// Voids a transaction. A posted transaction's balance effect is reversed
    /// in the same commit; its entries are retained.
    pub async fn void(
        &self,
        id: TransactionId,
        reason: &str,
        voided_by: UserId,
    ) -> Result<Transaction, LedgerError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::VoidReasonRequired.into());
        }

        let _claim = self.claim(id)?;
        let mut transaction = self.load(id).await?;
        let was_posted = transaction.status.is_posted();
        transaction.status = transaction.status.transition(WorkflowAction::Void)?;
        transaction.void_record = Some(VoidRecord {
            reason: reason.to_string(),
            voided_by,
            voided_at: self.clock.now(),
        });
        let expected = self.bump(&mut transaction);

        let batch = WriteBatch::transaction(transaction.clone(), expected);
        let reversed = if was_posted {
            let outcome = self.aggregator.reverse_posting_with(&transaction, batch).await?;
            if let Idempotent::Ignored = outcome {
                self.repo
                    .commit(WriteBatch::transaction(transaction.clone(), expected))
                    .await?;
                false
            } else {
                true
            }
        } else {
            self.repo.commit(batch).await?;
            false
        };

        info!(transaction_id = %id, %voided_by, reason, reversed, "Transaction voided");
        Ok(transaction)
    }

    /// Records a payment on a posted bill or invoice.
    ///
    /// Overpayment is rejected. The status becomes `Paid` once the amount due
    /// is fully covered, `PartiallyPaid` otherwise.
    pub async fn record_payment(
        &self,
        id: TransactionId,
        amount: Decimal,
        paid_on: NaiveDate,
        recorded_by: UserId,
    ) -> Result<Transaction, LedgerError> {
        let _claim = self.claim(id)?;
        let mut transaction = self.load(id).await?;

        let outstanding = match (&transaction.settlement, transaction.kind.is_payable()) {
            (Some(settlement), true) => settlement.outstanding(),
            _ => return Err(ValidationError::NotPayable(id).into()),
        };
        if !is_positive_minor_unit(amount) {
            return Err(ValidationError::InvalidPaymentAmount(amount).into());
        }
        let next = transaction
            .status
            .transition(WorkflowAction::RecordPayment {
                settled: amount >= outstanding,
            })?;
        if amount > outstanding {
            return Err(ValidationError::Overpayment {
                transaction: id,
                outstanding,
                payment: amount,
            }
            .into());
        }

        let now = self.clock.now();
        let payment = Payment {
            id: PaymentId::new(),
            amount,
            paid_on,
            recorded_by,
            recorded_at: now,
        };
        if let Some(settlement) = transaction.settlement.as_mut() {
            settlement.payments.push(payment);
        }
        transaction.status = next;

        let expected = self.bump(&mut transaction);
        self.repo.save_transaction(transaction.clone(), expected).await?;

        info!(
            transaction_id = %id,
            %amount,
            outstanding = %(outstanding - amount),
            status = %transaction.status,
            "Payment recorded"
        );
        Ok(transaction)
    }

    /// Loads a transaction.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.load(id).await
    }

    fn claim(&self, id: TransactionId) -> Result<Claim<TransactionId>, LedgerError> {
        self.claims.claim(id).ok_or_else(|| {
            LedgerError::ConcurrentModification(format!("transaction {id} is being modified"))
        })
    }

    async fn load(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.repo
            .load_transaction(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("transaction", id))
    }

    /// Bumps the version and timestamp, returning the version to expect in storage.
    fn bump(&self, transaction: &mut Transaction) -> u64 {
        let expected = transaction.version;
        transaction.version += 1;
        transaction.updated_at = self.clock.now();
        expected
    }

    async fn validate(&self, transaction: &Transaction) -> Result<EntryTotals, LedgerError> {
        let accounts =
            load_accounts(self.repo.as_ref(), transaction.entries.iter().map(|e| e.account_id).collect::<Vec<_>>()).await?;
        Ok(validate_entries(&transaction.entries, |id| accounts.get(&id))?)
    }

    async fn check_postable(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        self.validate(transaction).await?;
        let period = self
            .repo
            .load_fiscal_period(transaction.fiscal_period_id)
            .await?
            .ok_or(ValidationError::FiscalPeriodNotFound(transaction.fiscal_period_id))?;
        validate_posting_period(&period, transaction.transaction_date)?;
        Ok(())
    }
}

/// Checks and converts settlement terms for a new transaction.
fn settlement_terms(
    kind: TransactionKind,
    terms: Option<NewSettlement>,
) -> Result<Option<Settlement>, ValidationError> {
    match (kind, terms) {
        (TransactionKind::JournalEntry, None) => Ok(None),
        (TransactionKind::JournalEntry, Some(_)) => Err(ValidationError::SettlementNotAllowed),
        (kind, None) => Err(ValidationError::SettlementRequired(kind_label(kind))),
        (kind, Some(terms)) => {
            let counterparty_ok = matches!(
                (kind, terms.counterparty),
                (TransactionKind::Invoice, Counterparty::Customer(_))
                    | (TransactionKind::Bill, Counterparty::Vendor(_))
            );
            if !counterparty_ok {
                return Err(ValidationError::CounterpartyMismatch(kind_label(kind)));
            }
            if !is_positive_minor_unit(terms.amount_due) {
                return Err(ValidationError::InvalidAmountDue(terms.amount_due));
            }
            Ok(Some(Settlement {
                counterparty: terms.counterparty,
                due_date: terms.due_date,
                amount_due: terms.amount_due,
                payments: Vec::new(),
            }))
        }
    }
}
