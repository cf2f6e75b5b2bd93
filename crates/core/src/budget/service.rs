//! Budget creation and lifecycle.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use fundbook_shared::types::{is_minor_unit, BudgetId, BudgetItemId, UserId};

use super::allocation::resolve_distribution;
use super::error::BudgetError;
use super::types::{Budget, BudgetAction, BudgetItem, BudgetRevision, BudgetStatus, NewBudget};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::repository::{load_accounts, LedgerRepository};

/// Service for budget creation and status changes.
///
/// Item changes after creation go through
/// [`BudgetRevisionEngine`](super::BudgetRevisionEngine).
pub struct BudgetService<R: LedgerRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: LedgerRepository> BudgetService<R> {
    /// Create a new budget service.
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Creates a draft budget.
    ///
    /// Every item needs a known account and a non-negative amount; missing
    /// distributions are spread evenly over the budget's periods.
    pub async fn create_budget(&self, input: NewBudget) -> Result<Budget, LedgerError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(BudgetError::EmptyName.into());
        }
        if self.repo.load_fiscal_year(input.fiscal_year_id).await?.is_none() {
            return Err(LedgerError::not_found("fiscal year", input.fiscal_year_id));
        }

        let accounts =
            load_accounts(self.repo.as_ref(), input.items.iter().map(|i| i.account_id)).await?;
        let slots = input.period_type.slots();

        let mut items = Vec::with_capacity(input.items.len());
        for item in input.items {
            if !accounts.contains_key(&item.account_id) {
                return Err(BudgetError::AccountNotFound(item.account_id).into());
            }
            if item.amount < Decimal::ZERO || !is_minor_unit(item.amount) {
                return Err(BudgetError::InvalidAmount(item.amount).into());
            }
            items.push(BudgetItem {
                id: BudgetItemId::new(),
                account_id: item.account_id,
                amount: item.amount,
                period_distribution: resolve_distribution(item.amount, item.distribution, slots)?,
                notes: item.notes,
            });
        }

        let now = self.clock.now();
        let budget = Budget {
            id: BudgetId::new(),
            name,
            fiscal_year_id: input.fiscal_year_id,
            fund_id: input.fund_id,
            period_type: input.period_type,
            status: BudgetStatus::Draft,
            total_amount: items.iter().map(|item| item.amount).sum(),
            items,
            version: 1,
            revision_number: 0,
            created_by: input.created_by,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.repo.save_budget(budget.clone(), 0).await?;

        info!(
            budget_id = %budget.id,
            items = budget.items.len(),
            total = %budget.total_amount,
            "Budget created"
        );
        Ok(budget)
    }

    /// Draft → PendingApproval.
    pub async fn submit(&self, id: BudgetId) -> Result<Budget, LedgerError> {
        self.change_status(id, BudgetAction::Submit, None).await
    }

    /// PendingApproval → Approved, recording the approver.
    pub async fn approve(&self, id: BudgetId, approved_by: UserId) -> Result<Budget, LedgerError> {
        self.change_status(id, BudgetAction::Approve, Some(approved_by))
            .await
    }

    /// PendingApproval → Rejected.
    pub async fn reject(&self, id: BudgetId) -> Result<Budget, LedgerError> {
        self.change_status(id, BudgetAction::Reject, None).await
    }

    /// Rejected → Draft.
    pub async fn reopen(&self, id: BudgetId) -> Result<Budget, LedgerError> {
        self.change_status(id, BudgetAction::Reopen, None).await
    }

    /// Approved → Active.
    pub async fn activate(&self, id: BudgetId) -> Result<Budget, LedgerError> {
        self.change_status(id, BudgetAction::Activate, None).await
    }

    /// Active → Closed.
    pub async fn close(&self, id: BudgetId) -> Result<Budget, LedgerError> {
        self.change_status(id, BudgetAction::Close, None).await
    }

    /// Loads a budget.
    pub async fn get_budget(&self, id: BudgetId) -> Result<Budget, LedgerError> {
        self.repo
            .load_budget(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("budget", id))
    }

    /// Lists a budget's revisions, oldest first.
    pub async fn list_revisions(&self, id: BudgetId) -> Result<Vec<BudgetRevision>, LedgerError> {
        Ok(self.repo.list_budget_revisions(id).await?)
    }

    async fn change_status(
        &self,
        id: BudgetId,
        action: BudgetAction,
        approver: Option<UserId>,
    ) -> Result<Budget, LedgerError> {
        let mut budget = self.get_budget(id).await?;
        let from = budget.status;
        budget.status = from.transition(action)?;

        let now = self.clock.now();
        if let Some(approver) = approver {
            budget.approved_by = Some(approver);
            budget.approved_at = Some(now);
        }
        let expected = budget.version;
        budget.version += 1;
        budget.updated_at = now;
        self.repo.save_budget(budget.clone(), expected).await?;

        info!(budget_id = %id, %from, to = %budget.status, "Budget status changed");
        Ok(budget)
    }
}
