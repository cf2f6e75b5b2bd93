//! Property-based tests for ledger entry validation rules.

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use fundbook_shared::types::{AccountId, TransactionId};

use super::entry::{EntryInput, TransactionEntry};
use super::validation::{validate_entries, validate_line_shape, ValidationError};
use crate::chart::{Account, AccountType};

/// Strategy to generate a valid positive amount (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a negative amount.
fn negative_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(-cents, 2))
}

fn active_account() -> Account {
    let now = Utc::now();
    let account_type = AccountType::Asset;
    Account {
        id: AccountId::new(),
        number: "1000".to_string(),
        name: "Operating Cash".to_string(),
        account_type,
        subtype: None,
        normal_balance: account_type.normal_balance(),
        is_active: true,
        parent_id: None,
        fund_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn to_entries(inputs: &[EntryInput]) -> Vec<TransactionEntry> {
    let txn = TransactionId::new();
    inputs
        .iter()
        .map(|input| TransactionEntry::from_input(txn, input))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any split of a debit total across several credit lines validates, and
    /// the reported totals equal the debit total.
    #[test]
    fn prop_split_balanced_transaction_accepted(
        parts in prop::collection::vec(positive_amount(), 1..8),
    ) {
        let debit_account = active_account();
        let credit_account = active_account();
        let accounts: HashMap<_, _> = [debit_account.clone(), credit_account.clone()]
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let total: Decimal = parts.iter().copied().sum();
        let mut inputs = vec![EntryInput::debit(debit_account.id, total)];
        inputs.extend(parts.iter().map(|p| EntryInput::credit(credit_account.id, *p)));

        let totals = validate_entries(&to_entries(&inputs), |id| accounts.get(&id));
        prop_assert!(totals.is_ok(), "balanced split rejected: {:?}", totals);
        let totals = totals.unwrap();
        prop_assert_eq!(totals.debit, total);
        prop_assert_eq!(totals.credit, total);
        prop_assert_eq!(totals.line_count, parts.len() + 1);
    }

    /// Any non-zero difference between the sides is rejected.
    #[test]
    fn prop_any_imbalance_rejected(
        amount in positive_amount(),
        delta in positive_amount(),
    ) {
        let a = active_account();
        let b = active_account();
        let accounts: HashMap<_, _> = [a.clone(), b.clone()].into_iter().map(|x| (x.id, x)).collect();

        let inputs = [
            EntryInput::debit(a.id, amount + delta),
            EntryInput::credit(b.id, amount),
        ];
        let result = validate_entries(&to_entries(&inputs), |id| accounts.get(&id));
        prop_assert_eq!(
            result,
            Err(ValidationError::Unbalanced { debit: amount + delta, credit: amount })
        );
    }

    /// Negative amounts are rejected wherever they appear.
    #[test]
    fn prop_negative_amount_rejected(
        neg in negative_amount(),
        other in positive_amount(),
        as_credit in any::<bool>(),
    ) {
        let id = AccountId::new();
        let bad = if as_credit {
            EntryInput { credit_amount: neg, ..EntryInput::credit(id, Decimal::ZERO) }
        } else {
            EntryInput::debit(id, neg)
        };
        let inputs = [EntryInput::debit(id, other), bad];

        prop_assert_eq!(
            validate_line_shape(&to_entries(&inputs)),
            Err(ValidationError::NegativeAmount { line: 1 })
        );
    }

    /// Amounts with sub-cent precision never pass the shape check.
    #[test]
    fn prop_sub_minor_unit_rejected(mills in 1i64..1_000_000i64) {
        prop_assume!(mills % 10 != 0);
        let amount = Decimal::new(mills, 3);
        let inputs = [EntryInput::debit(AccountId::new(), amount)];

        prop_assert_eq!(
            validate_line_shape(&to_entries(&inputs)),
            Err(ValidationError::SubMinorUnit { line: 0, amount })
        );
    }
}
