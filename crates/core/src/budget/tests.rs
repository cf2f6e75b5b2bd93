//! Property-based tests for budget revisions.

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use fundbook_shared::types::{AccountId, BudgetId, BudgetItemId, FiscalYearId, UserId};

use super::allocation::spread_evenly;
use super::revision::plan_revision;
use super::types::{Budget, BudgetChange, BudgetItem, BudgetStatus, PeriodType};
use crate::chart::{Account, AccountType};

fn expense_account() -> Account {
    let now = Utc::now();
    Account {
        id: AccountId::new(),
        number: "6100".to_string(),
        name: "Program expenses".to_string(),
        account_type: AccountType::Expense,
        subtype: None,
        normal_balance: AccountType::Expense.normal_balance(),
        is_active: true,
        parent_id: None,
        fund_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn arb_period_type() -> impl Strategy<Value = PeriodType> {
    prop_oneof![
        Just(PeriodType::Monthly),
        Just(PeriodType::Quarterly),
        Just(PeriodType::Annual),
    ]
}

/// A change described by indices, resolved against the current items.
#[derive(Debug, Clone)]
enum Op {
    Add(i64),
    Modify(usize, i64),
    Remove(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..10_000_000).prop_map(Op::Add),
        (0usize..8, 0i64..10_000_000).prop_map(|(i, c)| Op::Modify(i, c)),
        (0usize..8).prop_map(Op::Remove),
    ]
}

fn budget(period_type: PeriodType, account: &Account, amounts: &[i64]) -> Budget {
    let now = Utc::now();
    let slots = period_type.slots();
    let items: Vec<BudgetItem> = amounts
        .iter()
        .map(|cents| {
            let amount = Decimal::new(*cents, 2);
            BudgetItem {
                id: BudgetItemId::new(),
                account_id: account.id,
                amount,
                period_distribution: spread_evenly(amount, slots),
                notes: None,
            }
        })
        .collect();
    Budget {
        id: BudgetId::new(),
        name: "Annual operating".to_string(),
        fiscal_year_id: FiscalYearId::new(),
        fund_id: None,
        period_type,
        status: BudgetStatus::Active,
        total_amount: items.iter().map(|i| i.amount).sum(),
        items,
        version: 3,
        revision_number: 2,
        created_by: UserId::new(),
        approved_by: None,
        approved_at: None,
        created_at: now,
        updated_at: now,
    }
}

proptest! {
    /// After any accepted revision every item's distribution has one slot per
    /// period and sums to its amount, and the new total is the item sum.
    #[test]
    fn prop_revision_preserves_distribution_invariant(
        period_type in arb_period_type(),
        initial in prop::collection::vec(1i64..10_000_000, 1..5),
        ops in prop::collection::vec(arb_op(), 1..6),
    ) {
        let account = expense_account();
        let accounts = HashMap::from([(account.id, account.clone())]);
        let budget = budget(period_type, &account, &initial);

        let ids: Vec<BudgetItemId> = budget.items.iter().map(|i| i.id).collect();
        let changes: Vec<BudgetChange> = ops
            .iter()
            .map(|op| match op {
                Op::Add(cents) => BudgetChange::Add {
                    account_id: account.id,
                    amount: Decimal::new(*cents, 2),
                    distribution: None,
                    notes: None,
                },
                Op::Modify(i, cents) => BudgetChange::Modify {
                    item_id: ids[i % ids.len()],
                    amount: Some(Decimal::new(*cents, 2)),
                    distribution: None,
                    notes: None,
                },
                Op::Remove(i) => BudgetChange::Remove { item_id: ids[i % ids.len()] },
            })
            .collect();

        match plan_revision(&budget, &changes, &accounts) {
            Ok(plan) => {
                prop_assert_eq!(plan.previous_total, budget.total_amount);
                prop_assert_eq!(plan.applied.len(), changes.len());
                let sum: Decimal = plan.items.iter().map(|i| i.amount).sum();
                prop_assert_eq!(plan.new_total, sum);
                for item in &plan.items {
                    prop_assert_eq!(item.period_distribution.len(), period_type.slots());
                    prop_assert_eq!(
                        item.period_distribution.iter().copied().sum::<Decimal>(),
                        item.amount
                    );
                }
            }
            Err(err) => {
                // only touching an item removed earlier in the set can fail here
                prop_assert!(matches!(err, super::BudgetError::ItemRemoved(_)));
            }
        }
    }
}
