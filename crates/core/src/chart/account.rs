//! Account domain types and normal-balance rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use fundbook_shared::types::{AccountId, FundId};

/// Account classification in the chart of accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Resources owned (cash, receivables).
    Asset,
    /// Obligations owed (payables, deferred revenue).
    Liability,
    /// Net assets / fund balances.
    Equity,
    /// Contributions, grants and other income.
    Revenue,
    /// Program, management and fundraising costs.
    Expense,
}

impl AccountType {
    /// Returns the side on which this account type naturally increases.
    #[must_use]
    pub fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Returns the string representation of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }
}

/// The side on which an account's balance increases.
///
/// - Debit-normal (Asset, Expense): balance += debit - credit
/// - Credit-normal (Liability, Equity, Revenue): balance += credit - debit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalBalance {
    /// Increases with debits.
    Debit,
    /// Increases with credits.
    Credit,
}

impl NormalBalance {
    /// Calculates the balance change for a debit/credit pair.
    #[must_use]
    pub fn balance_change(self, debit: Decimal, credit: Decimal) -> Decimal {
        match self {
            Self::Debit => debit - credit,
            Self::Credit => credit - debit,
        }
    }
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Human-assigned account number, unique across the chart.
    pub number: String,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Finer classification (e.g. "current_asset").
    pub subtype: Option<String>,
    /// Side on which the balance increases.
    pub normal_balance: NormalBalance,
    /// Inactive accounts may not receive new entries.
    pub is_active: bool,
    /// Parent account in the chart tree.
    pub parent_id: Option<AccountId>,
    /// Fund this account is dedicated to, if any.
    pub fund_id: Option<FundId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Human-assigned account number.
    pub number: String,
    /// Display name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Finer classification.
    pub subtype: Option<String>,
    /// Overrides the type's default normal balance (contra accounts).
    pub normal_balance: Option<NormalBalance>,
    /// Parent account.
    pub parent_id: Option<AccountId>,
    /// Dedicated fund.
    pub fund_id: Option<FundId>,
}

impl NewAccount {
    /// Creates input for a top-level account with the type's normal balance.
    #[must_use]
    pub fn new(number: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            number: number.into(),
            name: name.into(),
            account_type,
            subtype: None,
            normal_balance: None,
            parent_id: None,
            fund_id: None,
        }
    }

    /// Places the account under `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: AccountId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Overrides the normal balance.
    #[must_use]
    pub fn with_normal_balance(mut self, normal_balance: NormalBalance) -> Self {
        self.normal_balance = Some(normal_balance);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_normal_balances() {
        assert_eq!(AccountType::Asset.normal_balance(), NormalBalance::Debit);
        assert_eq!(AccountType::Expense.normal_balance(), NormalBalance::Debit);
        assert_eq!(AccountType::Liability.normal_balance(), NormalBalance::Credit);
        assert_eq!(AccountType::Equity.normal_balance(), NormalBalance::Credit);
        assert_eq!(AccountType::Revenue.normal_balance(), NormalBalance::Credit);
    }

    #[test]
    fn test_debit_normal_balance_change() {
        let side = NormalBalance::Debit;
        assert_eq!(side.balance_change(dec!(100), dec!(0)), dec!(100));
        assert_eq!(side.balance_change(dec!(0), dec!(50)), dec!(-50));
        assert_eq!(side.balance_change(dec!(100), dec!(30)), dec!(70));
    }

    #[test]
    fn test_credit_normal_balance_change() {
        let side = NormalBalance::Credit;
        assert_eq!(side.balance_change(dec!(0), dec!(100)), dec!(100));
        assert_eq!(side.balance_change(dec!(50), dec!(0)), dec!(-50));
        assert_eq!(side.balance_change(dec!(30), dec!(100)), dec!(70));
    }
}
