//! Folding transaction lines into per-bucket deltas.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use fundbook_shared::types::{AccountId, FiscalPeriodId, FiscalYearId};

use super::types::{BalanceKey, PostingLine};
use crate::chart::Account;
use crate::ledger::{Transaction, TransactionEntry, ValidationError};

/// Folds `entries` into one line per (account, fund), signed by each
/// account's normal balance. Lines come back sorted by key.
///
/// # Errors
///
/// Returns [`ValidationError::AccountNotFound`] if an account is missing
/// from `accounts`.
pub fn fold_entries<'a, I>(
    entries: I,
    fiscal_year_id: FiscalYearId,
    fiscal_period_id: FiscalPeriodId,
    accounts: &HashMap<AccountId, Account>,
) -> Result<Vec<PostingLine>, ValidationError>
where
    I: IntoIterator<Item = &'a TransactionEntry>,
{
    let mut folded: BTreeMap<BalanceKey, (Decimal, Decimal)> = BTreeMap::new();
    for entry in entries {
        let key = BalanceKey {
            account_id: entry.account_id,
            fiscal_period_id,
            fund_id: entry.fund_id,
        };
        let totals = folded.entry(key).or_default();
        totals.0 += entry.debit_amount;
        totals.1 += entry.credit_amount;
    }

    folded
        .into_iter()
        .map(|(key, (debit, credit))| {
            let account = accounts
                .get(&key.account_id)
                .ok_or(ValidationError::AccountNotFound(key.account_id))?;
            Ok(PostingLine {
                account_id: key.account_id,
                fiscal_year_id,
                fiscal_period_id: key.fiscal_period_id,
                fund_id: key.fund_id,
                debit,
                credit,
                net_change: account.normal_balance.balance_change(debit, credit),
            })
        })
        .collect()
}

/// The deltas posting `transaction` applies.
///
/// # Errors
///
/// See [`fold_entries`].
pub fn posting_lines(
    transaction: &Transaction,
    accounts: &HashMap<AccountId, Account>,
) -> Result<Vec<PostingLine>, ValidationError> {
    fold_entries(
        &transaction.entries,
        transaction.fiscal_year_id,
        transaction.fiscal_period_id,
        accounts,
    )
}
