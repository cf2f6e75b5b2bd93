//! Budget revisions.
//!
//! A revision applies an ordered change-set to a budget's items. Planning is
//! pure; the engine commits the mutated budget and the revision record in one
//! version-checked batch, so a failed revision leaves nothing behind.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};
use fundbook_shared::types::{
    is_minor_unit, AccountId, BudgetId, BudgetItemId, BudgetRevisionId, UserId,
};

use super::allocation::{resolve_distribution, spread_evenly};
use super::error::BudgetError;
use super::types::{AppliedChange, Budget, BudgetChange, BudgetItem, BudgetRevision};
use crate::chart::Account;
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::guard::ClaimSet;
use crate::repository::{load_accounts, LedgerRepository, Versioned, WriteBatch};

/// Items and change log produced by planning a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionPlan {
    /// Items after every change.
    pub items: Vec<BudgetItem>,
    /// What each change did, in order.
    pub applied: Vec<AppliedChange>,
    /// Total before.
    pub previous_total: Decimal,
    /// Total after.
    pub new_total: Decimal,
}

fn check_amount(amount: Decimal, allow_zero: bool) -> Result<(), BudgetError> {
    let in_range = if allow_zero {
        amount >= Decimal::ZERO
    } else {
        amount > Decimal::ZERO
    };
    if in_range && is_minor_unit(amount) {
        Ok(())
    } else {
        Err(BudgetError::InvalidAmount(amount))
    }
}

/// Applies `changes` to a copy of `budget`'s items.
///
/// `accounts` must hold every account referenced by an `Add`. Nothing in
/// `budget` is mutated.
pub fn plan_revision(
    budget: &Budget,
    changes: &[BudgetChange],
    accounts: &HashMap<AccountId, Account>,
) -> Result<RevisionPlan, BudgetError> {
    if !budget.status.accepts_revisions() {
        return Err(BudgetError::RevisionNotAllowed(budget.status));
    }
    if changes.is_empty() {
        return Err(BudgetError::EmptyChangeSet);
    }

    let slots = budget.period_type.slots();
    let mut items = budget.items.clone();
    let mut removed: HashSet<BudgetItemId> = HashSet::new();
    let mut applied = Vec::with_capacity(changes.len());

    for change in changes {
        match change {
            BudgetChange::Add {
                account_id,
                amount,
                distribution,
                notes,
            } => {
                if !accounts.contains_key(account_id) {
                    return Err(BudgetError::AccountNotFound(*account_id));
                }
                check_amount(*amount, false)?;
                let item = BudgetItem {
                    id: BudgetItemId::new(),
                    account_id: *account_id,
                    amount: *amount,
                    period_distribution: resolve_distribution(*amount, distribution.clone(), slots)?,
                    notes: notes.clone(),
                };
                items.push(item.clone());
                applied.push(AppliedChange::Add { item });
            }
            BudgetChange::Modify {
                item_id,
                amount,
                distribution,
                notes,
            } => {
                let index = find_item(&items, &removed, *item_id)?;
                let before = items[index].clone();
                let mut after = before.clone();

                if let Some(amount) = amount {
                    check_amount(*amount, true)?;
                    after.amount = *amount;
                }
                after.period_distribution = match distribution {
                    Some(_) => resolve_distribution(after.amount, distribution.clone(), slots)?,
                    None if after.amount != before.amount => spread_evenly(after.amount, slots),
                    None => before.period_distribution.clone(),
                };
                if let Some(notes) = notes {
                    after.notes = Some(notes.clone());
                }

                items[index] = after.clone();
                applied.push(AppliedChange::Modify { before, after });
            }
            BudgetChange::Remove { item_id } => {
                let index = find_item(&items, &removed, *item_id)?;
                let item = items.remove(index);
                removed.insert(item.id);
                applied.push(AppliedChange::Remove { item });
            }
        }
    }

    let new_total = items.iter().map(|item| item.amount).sum();
    Ok(RevisionPlan {
        items,
        applied,
        previous_total: budget.total_amount,
        new_total,
    })
}

fn find_item(
    items: &[BudgetItem],
    removed: &HashSet<BudgetItemId>,
    id: BudgetItemId,
) -> Result<usize, BudgetError> {
    if removed.contains(&id) {
        return Err(BudgetError::ItemRemoved(id));
    }
    items
        .iter()
        .position(|item| item.id == id)
        .ok_or(BudgetError::ItemNotFound(id))
}

/// Applies change-sets to stored budgets.
pub struct BudgetRevisionEngine<R: LedgerRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    claims: ClaimSet<BudgetId>,
}

impl<R: LedgerRepository> BudgetRevisionEngine<R> {
    /// Create a new revision engine.
    #[must_use]
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            claims: ClaimSet::new(),
        }
    }

    /// Validates and applies `changes` to a budget.
    ///
    /// Every change is checked before anything is written. The budget's items,
    /// total, version and revision counter are committed together with the
    /// revision record.
    pub async fn apply_revision(
        &self,
        budget_id: BudgetId,
        changes: Vec<BudgetChange>,
        revised_by: UserId,
        reason: Option<String>,
    ) -> Result<BudgetRevision, LedgerError> {
        let _claim = self.claims.claim(budget_id).ok_or_else(|| {
            LedgerError::ConcurrentModification(format!("budget {budget_id} is being revised"))
        })?;

        let mut budget = self
            .repo
            .load_budget(budget_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("budget", budget_id))?;

        let added = changes.iter().filter_map(|change| match change {
            BudgetChange::Add { account_id, .. } => Some(*account_id),
            _ => None,
        });
        let accounts = load_accounts(self.repo.as_ref(), added).await?;

        let plan = match plan_revision(&budget, &changes, &accounts) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(%budget_id, error = %err, "Budget revision rejected");
                return Err(err.into());
            }
        };

        let now = self.clock.now();
        let expected = budget.version;
        budget.items = plan.items;
        budget.total_amount = plan.new_total;
        budget.version += 1;
        budget.revision_number += 1;
        budget.updated_at = now;

        let revision = BudgetRevision {
            id: BudgetRevisionId::new(),
            budget_id,
            revision_number: budget.revision_number,
            changes: plan.applied,
            previous_total: plan.previous_total,
            new_total: plan.new_total,
            reason,
            revised_by,
            revised_at: now,
        };

        let batch = WriteBatch {
            budget: Some(Versioned::new(budget, expected)),
            budget_revisions: vec![revision.clone()],
            ..WriteBatch::default()
        };
        self.repo.commit(batch).await?;

        info!(
            %budget_id,
            revision = revision.revision_number,
            changes = revision.changes.len(),
            previous_total = %revision.previous_total,
            new_total = %revision.new_total,
            "Budget revised"
        );
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::types::{BudgetStatus, PeriodType};
    use crate::chart::{AccountType, NewAccount};
    use chrono::Utc;
    use fundbook_shared::types::FiscalYearId;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        let input = NewAccount::new("5100", "Program supplies", AccountType::Expense);
        let now = Utc::now();
        Account {
            id: AccountId::new(),
            number: input.number,
            name: input.name,
            account_type: input.account_type,
            subtype: None,
            normal_balance: input.account_type.normal_balance(),
            is_active: true,
            parent_id: None,
            fund_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn budget(items: Vec<BudgetItem>) -> Budget {
        let now = Utc::now();
        let total_amount = items.iter().map(|item| item.amount).sum();
        Budget {
            id: BudgetId::new(),
            name: "Operating".to_string(),
            fiscal_year_id: FiscalYearId::new(),
            fund_id: None,
            period_type: PeriodType::Quarterly,
            status: BudgetStatus::Draft,
            items,
            total_amount,
            version: 1,
            revision_number: 0,
            created_by: UserId::new(),
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(account_id: AccountId, amount: Decimal) -> BudgetItem {
        BudgetItem {
            id: BudgetItemId::new(),
            account_id,
            amount,
            period_distribution: spread_evenly(amount, 4),
            notes: None,
        }
    }

    #[test]
    fn test_plan_add_modify_remove() {
        let acct = account();
        let accounts = HashMap::from([(acct.id, acct.clone())]);
        let keep = item(acct.id, dec!(400));
        let drop = item(acct.id, dec!(200));
        let budget = budget(vec![keep.clone(), drop.clone()]);

        let plan = plan_revision(
            &budget,
            &[
                BudgetChange::Add {
                    account_id: acct.id,
                    amount: dec!(100),
                    distribution: None,
                    notes: Some("new line".to_string()),
                },
                BudgetChange::Modify {
                    item_id: keep.id,
                    amount: Some(dec!(1000)),
                    distribution: None,
                    notes: None,
                },
                BudgetChange::Remove { item_id: drop.id },
            ],
            &accounts,
        )
        .unwrap();

        assert_eq!(plan.previous_total, dec!(600));
        assert_eq!(plan.new_total, dec!(1100));
        assert_eq!(plan.items.len(), 2);
        assert_eq!(plan.applied.len(), 3);

        let modified = plan.items.iter().find(|i| i.id == keep.id).unwrap();
        assert_eq!(modified.period_distribution, vec![dec!(250); 4]);
        for item in &plan.items {
            assert_eq!(item.period_distribution.iter().copied().sum::<Decimal>(), item.amount);
        }
    }

    #[test]
    fn test_modify_after_remove_is_rejected() {
        let acct = account();
        let doomed = item(acct.id, dec!(200));
        let budget = budget(vec![doomed.clone()]);

        let err = plan_revision(
            &budget,
            &[
                BudgetChange::Remove { item_id: doomed.id },
                BudgetChange::Modify {
                    item_id: doomed.id,
                    amount: Some(dec!(10)),
                    distribution: None,
                    notes: None,
                },
            ],
            &HashMap::new(),
        )
        .unwrap_err();
        assert_eq!(err, BudgetError::ItemRemoved(doomed.id));
    }

    #[test]
    fn test_add_requires_known_account_and_positive_amount() {
        let acct = account();
        let budget = budget(vec![]);
        let accounts = HashMap::from([(acct.id, acct.clone())]);

        let unknown = AccountId::new();
        let err = plan_revision(
            &budget,
            &[BudgetChange::Add {
                account_id: unknown,
                amount: dec!(10),
                distribution: None,
                notes: None,
            }],
            &accounts,
        )
        .unwrap_err();
        assert_eq!(err, BudgetError::AccountNotFound(unknown));

        let err = plan_revision(
            &budget,
            &[BudgetChange::Add {
                account_id: acct.id,
                amount: dec!(0),
                distribution: None,
                notes: None,
            }],
            &accounts,
        )
        .unwrap_err();
        assert_eq!(err, BudgetError::InvalidAmount(dec!(0)));
    }

    #[test]
    fn test_explicit_distribution_must_match() {
        let acct = account();
        let budget = budget(vec![]);
        let accounts = HashMap::from([(acct.id, acct.clone())]);

        let err = plan_revision(
            &budget,
            &[BudgetChange::Add {
                account_id: acct.id,
                amount: dec!(100),
                distribution: Some(vec![dec!(10), dec!(10), dec!(10), dec!(10)]),
                notes: None,
            }],
            &accounts,
        )
        .unwrap_err();
        assert_eq!(
            err,
            BudgetError::DistributionMismatch {
                amount: dec!(100),
                distributed: dec!(40)
            }
        );
    }

    #[test]
    fn test_locked_statuses_refuse_revisions() {
        let mut budget = budget(vec![]);
        budget.status = BudgetStatus::Closed;
        let err = plan_revision(&budget, &[], &HashMap::new()).unwrap_err();
        assert_eq!(err, BudgetError::RevisionNotAllowed(BudgetStatus::Closed));

        budget.status = BudgetStatus::Active;
        let err = plan_revision(&budget, &[], &HashMap::new()).unwrap_err();
        assert_eq!(err, BudgetError::EmptyChangeSet);
    }
}
